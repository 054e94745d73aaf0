//! Application state shared across handlers.

use std::sync::Arc;
use upchunk_core::config::AppConfig;
use upchunk_registry::UploadRegistry;
use upchunk_storage::ChunkStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Chunk and artifact storage.
    pub chunks: ChunkStore,
    /// Upload session registry.
    pub registry: Arc<dyn UploadRegistry>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: AppConfig, chunks: ChunkStore, registry: Arc<dyn UploadRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            chunks,
            registry,
        }
    }
}
