use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

/// Durable store for serialized analysis results.
///
/// Each key holds at most one result, tagged with the fingerprint of the
/// sources it was computed from.
pub trait Storage: Send + Sync {
    /// Stored body for `key`, only if it was saved for `fingerprint`.
    fn get(&self, key: &str, fingerprint: &str) -> Result<Option<Vec<u8>>>;
    /// Store `data` for `key`, replacing results saved for other fingerprints.
    fn save(&self, key: &str, fingerprint: &str, data: &[u8]) -> Result<()>;
}

/// One directory per key and one JSON file per fingerprint, both named by
/// SHA-256.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_dir(&self, key: &str) -> PathBuf {
        self.dir.join(compute_hash(key))
    }

    fn entry_path(&self, key: &str, fingerprint: &str) -> PathBuf {
        self.key_dir(key)
            .join(format!("{}.json", compute_hash(fingerprint)))
    }

    /// Remove results stored for `key` other than `keep`.
    fn prune(&self, key: &str, keep: &Path) -> Result<()> {
        let key_dir = self.key_dir(key);
        let entries = std::fs::read_dir(&key_dir)
            .with_context(|| format!("failed to list '{}'", key_dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path != keep && path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("failed to remove stale result '{}'", path.display()))?;
            }
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str, fingerprint: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key, fingerprint);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&path)
            .with_context(|| format!("failed to read stored result '{}'", path.display()))?;
        Ok(Some(data))
    }

    fn save(&self, key: &str, fingerprint: &str, data: &[u8]) -> Result<()> {
        let key_dir = self.key_dir(key);
        std::fs::create_dir_all(&key_dir)
            .with_context(|| format!("failed to create '{}'", key_dir.display()))?;
        let path = self.entry_path(key, fingerprint);
        std::fs::write(&path, data)
            .with_context(|| format!("failed to write stored result '{}'", path.display()))?;
        self.prune(key, &path)
    }
}

/// Persist `data` in the background. Failures are logged and never reach the caller.
pub fn spawn_write_behind(
    storage: Arc<dyn Storage>,
    key: String,
    fingerprint: String,
    data: Arc<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match storage.save(&key, &fingerprint, &data) {
        Ok(()) => tracing::debug!(key = %key, bytes = data.len(), "stored analysis result"),
        Err(e) => tracing::warn!(key = %key, "failed to store analysis result: {e:#}"),
    })
}

/// Compute SHA-256 hash of a key or file content.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
