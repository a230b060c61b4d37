//! Key-value persistence the template store sits on.
//! String keys, string values, async like the platform storage it stands in for.

pub mod file;
pub mod keys;
pub mod memory;

pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the key was never written.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
}
