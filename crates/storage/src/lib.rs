//! Storage layer: object-store abstraction and the content-addressed chunk
//! store used by the upload server.

pub mod backends;
pub mod chunks;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use chunks::ChunkStore;
pub use error::{StorageError, StorageResult};
pub use traits::{ObjectMeta, ObjectStore, StreamingUpload};

use std::sync::Arc;
use upchunk_core::config::StorageConfig;

/// Construct an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            Ok(Arc::new(FilesystemBackend::new(path).await?))
        }
    }
}
