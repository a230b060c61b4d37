//! Single JSON object file holding every key.
//!
//! The whole map is kept in memory and rewritten on each `set_item`
//! through a temp file in the same directory, then renamed over the
//! target, so readers never see a half-written file.

use super::{KeyValueStore, Result, StorageError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct FileStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens `path`, creating nothing until the first write.
    /// An unreadable file is treated as empty and replaced on the next write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let items = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path.display(), "Storage file is corrupt, starting empty: {}", e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };

        info!(path = %path.display(), keys = items.len(), "File store opened");

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let body = serde_json::to_string_pretty(items)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)?;

            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(body.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Unavailable(e.to_string()))??;

        debug!(path = %self.path.display(), "File store flushed");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().await;
        let previous = items.insert(key.to_string(), value.to_string());

        if let Err(e) = self.flush(&items).await {
            // Keep memory in step with what is on disk.
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}
