//! Shared application state handed to every axum handler.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<Store>,
    /// `http://<host>:<bound_port>`, computed once the listener is bound.
    pub base_url: Arc<str>,
}
