use std::sync::Arc;

use crate::config::StorageConfig;

/// Shared application state passed to all Axum handlers via `.with_state()`.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageConfig>,
}

impl AppState {
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }
}
