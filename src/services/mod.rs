//! Collaborators behind the HTTP layer and the state that carries them.

pub mod metadata_recorder;
pub mod object_store;

use crate::config::AppConfig;
use metadata_recorder::MetadataRecorder;
use object_store::ObjectStore;
use std::sync::Arc;

/// Shared handler state, built once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ObjectStore>,
    pub recorder: Arc<dyn MetadataRecorder>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        recorder: Arc<dyn MetadataRecorder>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            recorder,
        }
    }
}
