pub mod soap;
pub mod stream;
pub mod xml;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{extract::State, Router};

use crate::state::AppState;

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/html; charset=\"utf-8\"")],
        format!("<html><body><h1>{}</h1><p>UPnP media server.</p></body></html>", xml::xml_escape(&state.config.server.name)),
    )
}

async fn device_description(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, [("Content-Type", "text/xml; charset=\"utf-8\"")], xml::device_description(&state.config))
}

async fn cds_scpd() -> impl IntoResponse {
    (StatusCode::OK, [("Content-Type", "text/xml; charset=\"utf-8\"")], xml::content_directory_scpd())
}

async fn cm_scpd() -> impl IntoResponse {
    (StatusCode::OK, [("Content-Type", "text/xml; charset=\"utf-8\"")], xml::connection_manager_scpd())
}

/// Builds the axum router over the server's HTTP surface: device and
/// service descriptions, SOAP control endpoints, and ranged content
/// streaming. No UPnP eventing/subscription endpoints are exposed.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/upnp/device", get(device_description))
        .route("/upnp/cds.xml", get(cds_scpd))
        .route("/upnp/cm.xml", get(cm_scpd))
        .route("/upnp/cds", axum::routing::post(soap::browse))
        .route("/upnp/cm", axum::routing::post(soap::connection_manager_control))
        .route("/content/{id}", get(stream::serve_content))
        .with_state(state)
}
