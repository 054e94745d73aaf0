//! Upload session registry.
//!
//! Sessions are keyed by file identity (name, size, chunk count, digest), so
//! re-starting an interrupted upload of the same file resumes the existing
//! session instead of allocating a new one.

pub mod error;
pub mod models;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use models::UploadRow;
pub use store::{SqliteRegistry, UploadRegistry};

use std::sync::Arc;
use upchunk_core::config::RegistryConfig;

/// Construct a registry from configuration.
pub async fn from_config(config: &RegistryConfig) -> RegistryResult<Arc<dyn UploadRegistry>> {
    match config {
        RegistryConfig::Sqlite { path } => Ok(Arc::new(SqliteRegistry::new(path).await?)),
    }
}
