//! Shared application state.

use filepool_core::Config;
use filepool_storage::Uploader;

/// State shared by all handlers. Built once at startup and wrapped in an
/// `Arc` by the router.
pub struct AppState {
    pub config: Config,
    pub uploader: Uploader,
}

impl AppState {
    pub fn new(config: Config, uploader: Uploader) -> Self {
        AppState { config, uploader }
    }
}
