//! JSON file sink for store snapshots.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::writer::SnapshotSink;
use crate::error::ExplorerError;
use crate::store::PersistedState;

/// Writes the whole snapshot to one JSON file, replacing it atomically
/// via a temporary sibling and a rename.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Creates a sink for `path`. Nothing is touched until the first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted document. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::Io`] if the file exists but cannot be read,
    /// or [`ExplorerError::Serialization`] if it is not a valid document.
    pub async fn load(&self) -> Result<Option<PersistedState>, ExplorerError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn write(&self, state: &PersistedState) -> Result<(), ExplorerError> {
        let bytes = serde_json::to_vec(state)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Block, Transaction};
    use crate::store::NextIds;

    fn sample_state() -> PersistedState {
        let mut block = Block::new(7, "0xseven", 1_700_000_000);
        block.id = 1;
        let mut tx = Transaction::new("0xtx", 7, 1_700_000_000, "0xu", "order");
        tx.id = 1;
        tx.block_hash = "0xseven".to_string();
        PersistedState {
            blocks: vec![block],
            transactions: vec![tx],
            next_ids: NextIds {
                block: 2,
                transaction: 2,
                ..NextIds::default()
            },
            ..PersistedState::default()
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let sink = JsonFileSink::new(dir.path().join("absent.json"));
        let loaded = tokio_test::assert_ok!(sink.load().await);
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn write_creates_parent_and_reloads() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let sink = JsonFileSink::new(dir.path().join("nested/state.json"));
        let state = sample_state();

        tokio_test::assert_ok!(sink.write(&state).await);
        assert!(!dir.path().join("nested/state.json.tmp").exists());

        let Ok(Some(loaded)) = sink.load().await else {
            panic!("reload failed");
        };
        assert_eq!(loaded.blocks, state.blocks);
        assert_eq!(loaded.transactions, state.transactions);
        assert_eq!(loaded.next_ids.block, 2);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let path = dir.path().join("state.json");
        assert!(tokio::fs::write(&path, b"{not json").await.is_ok());
        let sink = JsonFileSink::new(path);
        assert!(matches!(
            sink.load().await,
            Err(ExplorerError::Serialization(_))
        ));
    }
}
