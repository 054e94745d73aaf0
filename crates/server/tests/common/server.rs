//! Server test utilities.

use std::sync::Arc;
use tempfile::TempDir;
use upchunk_core::config::{AppConfig, RegistryConfig, StorageConfig};
use upchunk_registry::{SqliteRegistry, UploadRegistry};
use upchunk_server::{AppState, create_router};
use upchunk_storage::{ChunkStore, FilesystemBackend, ObjectStore};

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let db_path = temp_dir.path().join("registry.db");
        let registry: Arc<dyn UploadRegistry> = Arc::new(
            SqliteRegistry::new(&db_path)
                .await
                .expect("Failed to create registry"),
        );

        let mut config = AppConfig {
            storage: StorageConfig::Filesystem {
                path: storage_path,
            },
            registry: RegistryConfig::Sqlite { path: db_path },
            ..AppConfig::for_testing()
        };
        modifier(&mut config);

        let state = AppState::new(config, ChunkStore::new(storage), registry);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Direct access to the object store behind the chunk store.
    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(self.state.chunks.object_store())
    }
}
