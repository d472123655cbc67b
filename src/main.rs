use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use eems::config::AppConfig;
use eems::error::EemsError;
use eems::scanner::Scanner;
use eems::ssdp::SsdpResponder;
use eems::state::AppState;
use eems::store::Store;
use eems::{logging, web};

#[derive(Parser, Debug)]
#[command(author, version, about = "EEMS UPnP/DLNA movie server", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,
}

/// Waits for SIGTERM or SIGINT; a second SIGINT forces an immediate exit.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
                tokio::spawn(async move {
                    if sigint.recv().await.is_some() {
                        warn!("received second SIGINT, forcing exit");
                        std::process::exit(1);
                    }
                });
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
        } else {
            info!("received Ctrl+C");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config).context("failed to load configuration")?;
    logging::init(&config.logging).context("failed to initialize logging")?;

    info!(config = %args.config.display(), "starting EEMS");

    let (store, was_fresh) = Store::open_or_create(&config.db.path)
        .await
        .context("failed to open content store")?;
    let store = Arc::new(store);

    if was_fresh {
        info!("fresh database — scanning configured content roots");
        let scanner = Scanner::new(store.clone()).await.context("failed to initialize scanner")?;
        for root in &config.content {
            if let Err(e) = scanner.scan_root(root).await {
                error!(path = %root.path.display(), error = %e, "scan failed");
            }
        }
    } else {
        info!("existing database found — skipping initial scan");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    let bound_port = listener
        .local_addr()
        .context("failed to read bound listener address")?
        .port();
    let base_url: Arc<str> = Arc::from(format!("http://{}:{}", config.server.hostname, bound_port));

    info!(%base_url, uuid = %config.server.uuid, "HTTP server ready");

    let state = AppState {
        config: Arc::new(config.clone()),
        store: store.clone(),
        base_url: base_url.clone(),
    };

    let router = web::create_router(state);
    let http_handle = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .map_err(|e| EemsError::Fatal(e.to_string()))
    });

    let ssdp_responder = SsdpResponder::bind(base_url.to_string(), config.server.uuid)
        .context("failed to bind SSDP responder")?;
    let ssdp_handle = tokio::spawn(ssdp_responder.run());

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("shutdown signal received");
        }
        result = http_handle => {
            match result {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
                Err(e) => error!(error = %e, "HTTP server task panicked"),
            }
        }
        result = ssdp_handle => {
            match result {
                Ok(Ok(())) => warn!("SSDP responder stopped unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "SSDP responder failed"),
                Err(e) => error!(error = %e, "SSDP responder task panicked"),
            }
        }
    }

    info!("shutting down");
    Ok(())
}
