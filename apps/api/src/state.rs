use std::sync::Arc;

use crate::classifier::WasteClassifier;
use crate::config::Config;
use crate::storage::ProgressStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Progress and classification persistence. Postgres or in-memory, chosen at startup.
    pub store: Arc<dyn ProgressStore>,
    /// Pluggable classification producer. Default: MockClassifier.
    pub classifier: Arc<dyn WasteClassifier>,
}
