//! TOML configuration loading.
//!
//! Parsing is split into a `RawConfig` (what serde sees, all-optional) and
//! a finalized `AppConfig` (what the rest of the crate reads) so that
//! default derivation — hostname, server name, UUIDv5 — happens once, at
//! load time, and downstream code never has to re-check for absence.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{EemsError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub content: Vec<ContentRoot>,
    pub db: DbConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ContentRoot {
    pub path: PathBuf,
    pub use_folder_names: bool,
    pub use_collections: bool,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub uuid: Uuid,
    pub port: u16,
    pub hostname: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
    pub truncate: bool,
}

impl AppConfig {
    /// Reads, parses and validates a TOML file at `path`. Missing required
    /// keys (no `[[content]]` entries) are fatal; unknown keys are
    /// tolerated.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EemsError::Fatal(format!("cannot read config {}: {e}", path.display())))?;
        let raw: RawConfig = toml::from_str(&text)
            .map_err(|e| EemsError::Fatal(format!("invalid config {}: {e}", path.display())))?;
        raw.finalize()
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    content: Vec<RawContentRoot>,
    #[serde(default)]
    db: RawDbConfig,
    #[serde(default)]
    server: RawServerConfig,
    #[serde(default)]
    logging: RawLoggingConfig,
}

#[derive(Debug, Deserialize)]
struct RawContentRoot {
    #[serde(rename = "type")]
    kind: String,
    path: PathBuf,
    use_folder_names: Option<bool>,
    use_collections: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawDbConfig {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RawServerConfig {
    uuid: Option<String>,
    port: Option<u16>,
    hostname: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawLoggingConfig {
    path: Option<PathBuf>,
    #[serde(default)]
    truncate: bool,
}

impl RawConfig {
    fn finalize(self) -> Result<AppConfig> {
        if self.content.is_empty() {
            return Err(EemsError::Fatal("config has no [[content]] entries".into()));
        }

        let mut content = Vec::with_capacity(self.content.len());
        for root in self.content {
            if root.kind != "movies" {
                return Err(EemsError::Fatal(format!(
                    "unsupported content type '{}' (only \"movies\" is supported)",
                    root.kind
                )));
            }
            content.push(ContentRoot {
                path: root.path,
                use_folder_names: root.use_folder_names.unwrap_or(true),
                use_collections: root.use_collections.unwrap_or(true),
            });
        }

        let hostname = self.server.hostname.unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "localhost".to_string())
        });

        let uuid = match self.server.uuid {
            Some(s) => Uuid::parse_str(&s)
                .map_err(|e| EemsError::Fatal(format!("invalid server.uuid: {e}")))?,
            None => Uuid::new_v5(&Uuid::NAMESPACE_DNS, hostname.as_bytes()),
        };

        let name = self.server.name.unwrap_or_else(|| format!("EEMS at {hostname}"));

        Ok(AppConfig {
            content,
            db: DbConfig {
                path: self.db.path.unwrap_or_else(|| PathBuf::from("/var/lib/eems/db")),
            },
            server: ServerConfig {
                uuid,
                port: self.server.port.unwrap_or(0),
                hostname,
                name,
            },
            logging: LoggingConfig {
                path: self.logging.path,
                truncate: self.logging.truncate,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_uuid_deterministically_from_hostname() {
        let toml = r#"
            [[content]]
            type = "movies"
            path = "/media/movies"

            [server]
            hostname = "myhost"
        "#;
        let raw: RawConfig = toml::from_str(toml).unwrap();
        let cfg = raw.finalize().unwrap();
        let expected = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"myhost");
        assert_eq!(cfg.server.uuid, expected);
        assert_eq!(cfg.server.name, "EEMS at myhost");
    }

    #[test]
    fn defaults_use_folder_names_and_use_collections_to_true() {
        let toml = r#"
            [[content]]
            type = "movies"
            path = "/media/movies"
        "#;
        let raw: RawConfig = toml::from_str(toml).unwrap();
        let cfg = raw.finalize().unwrap();
        assert!(cfg.content[0].use_folder_names);
        assert!(cfg.content[0].use_collections);
    }

    #[test]
    fn missing_content_is_fatal() {
        let raw: RawConfig = toml::from_str("").unwrap();
        assert!(matches!(raw.finalize(), Err(EemsError::Fatal(_))));
    }

    #[test]
    fn explicit_uuid_is_parsed() {
        let toml = r#"
            [[content]]
            type = "movies"
            path = "/media/movies"

            [server]
            uuid = "6ba7b810-9dad-11d1-80b4-00c04fd430c8"
        "#;
        let raw: RawConfig = toml::from_str(toml).unwrap();
        let cfg = raw.finalize().unwrap();
        assert_eq!(cfg.server.uuid.to_string(), "6ba7b810-9dad-11d1-80b4-00c04fd430c8");
    }
}
