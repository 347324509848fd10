//! Artifact blob storage
//!
//! Files live under a fixed per-tier directory tree and are addressed by
//! bare filename everywhere else in the system; this collaborator is the
//! only place that knows the directory layout and the public URL mount.

use forge_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Which per-tier directory a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Images,
    Prototypes,
    Models,
}

impl StorageTier {
    pub fn dir_name(&self) -> &'static str {
        match self {
            StorageTier::Images => "images",
            StorageTier::Prototypes => "prototypes",
            StorageTier::Models => "models",
        }
    }
}

/// Local blob storage rooted at `<root>/{images,prototypes,models}`,
/// served over HTTP at `<base_url>/storage/...`.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    base_url: String,
}

impl Storage {
    /// Create the storage tree if missing.
    pub fn init(root: &Path, base_url: &str) -> Result<Self> {
        for tier in [StorageTier::Images, StorageTier::Prototypes, StorageTier::Models] {
            std::fs::create_dir_all(root.join(tier.dir_name()))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute URL a stored file is reachable at.
    pub fn url_for(&self, tier: StorageTier, filename: &str) -> String {
        format!("{}/storage/{}/{}", self.base_url, tier.dir_name(), filename)
    }

    fn path_of(&self, tier: StorageTier, filename: &str) -> Result<PathBuf> {
        // Stored locators are bare filenames; anything with a path
        // component is rejected before touching the filesystem
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(Error::InvalidInput(format!("invalid artifact filename: {filename:?}")));
        }
        Ok(self.root.join(tier.dir_name()).join(filename))
    }

    /// Write an artifact; returns the filename it is stored under.
    pub async fn persist(&self, tier: StorageTier, filename: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_of(tier, filename)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(filename.to_string())
    }

    pub async fn read(&self, tier: StorageTier, filename: &str) -> Result<Vec<u8>> {
        let path = self.path_of(tier, filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("artifact file {filename}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort delete; a miss or failure is logged and reported as
    /// `false`, never an error.
    pub async fn delete(&self, tier: StorageTier, filename: &str) -> bool {
        let path = match self.path_of(tier, filename) {
            Ok(path) => path,
            Err(_) => {
                warn!(filename, "refusing to delete artifact with invalid name");
                return false;
            }
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "artifact delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (TempDir, Storage) {
        let tmp = TempDir::new().unwrap();
        let storage = Storage::init(tmp.path(), "http://localhost:5860/").unwrap();
        (tmp, storage)
    }

    #[tokio::test]
    async fn persist_read_delete_round_trip() {
        let (_tmp, storage) = storage();

        let name = storage
            .persist(StorageTier::Images, "a.png", b"png-bytes")
            .await
            .unwrap();
        assert_eq!(name, "a.png");
        assert_eq!(storage.read(StorageTier::Images, "a.png").await.unwrap(), b"png-bytes");

        assert!(storage.delete(StorageTier::Images, "a.png").await);
        // Second delete is a miss, not an error
        assert!(!storage.delete(StorageTier::Images, "a.png").await);
    }

    #[tokio::test]
    async fn urls_resolve_per_tier_with_trimmed_base() {
        let (_tmp, storage) = storage();
        assert_eq!(
            storage.url_for(StorageTier::Models, "m.obj"),
            "http://localhost:5860/storage/models/m.obj"
        );
    }

    #[tokio::test]
    async fn path_components_are_rejected() {
        let (_tmp, storage) = storage();
        assert!(storage.persist(StorageTier::Images, "../evil.png", b"x").await.is_err());
        assert!(storage.read(StorageTier::Images, "a/b.png").await.is_err());
        assert!(!storage.delete(StorageTier::Images, "..").await);
    }

    #[tokio::test]
    async fn missing_file_reads_as_not_found() {
        let (_tmp, storage) = storage();
        let err = storage.read(StorageTier::Prototypes, "nope.obj").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
