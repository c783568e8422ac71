use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::{StorageKey, UploadError, UploadId, UploadResult, UploadStorage};

const STAGING_SUFFIX: &str = "part";

/// Filesystem storage: one file per upload under a root directory.
///
/// In-progress uploads live at `<root>/<id>.part`; `finalize` renames them to
/// `<root>/<id>`. Every operation resolves whichever of the two exists.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    /// Open (and create if needed) the root directory
    pub async fn open<P: Into<PathBuf>>(root: P) -> UploadResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn staging_path(&self, key: &StorageKey) -> UploadResult<PathBuf> {
        Ok(self.root.join(format!("{}.{}", checked(key)?, STAGING_SUFFIX)))
    }

    fn final_path(&self, key: &StorageKey) -> UploadResult<PathBuf> {
        Ok(self.root.join(checked(key)?))
    }

    /// Path currently holding the bytes for `key`, if any
    async fn resolve(&self, key: &StorageKey) -> UploadResult<Option<PathBuf>> {
        let staging = self.staging_path(key)?;
        if fs::try_exists(&staging).await? {
            return Ok(Some(staging));
        }
        let finished = self.final_path(key)?;
        if fs::try_exists(&finished).await? {
            return Ok(Some(finished));
        }
        Ok(None)
    }
}

fn checked(key: &StorageKey) -> UploadResult<&str> {
    let raw = key.as_str();
    if UploadId::parse(raw).is_none() {
        return Err(UploadError::invalid(format!("invalid storage key '{}'", raw)));
    }
    Ok(raw)
}

#[async_trait]
impl UploadStorage for FileSystemStorage {
    async fn create(&self, id: &UploadId) -> UploadResult<StorageKey> {
        let key = StorageKey(id.as_str().to_string());
        if self.resolve(&key).await?.is_some() {
            return Err(UploadError::Io {
                source: std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    format!("storage for {} already exists", id),
                ),
            });
        }

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.staging_path(&key)?)
            .await?;

        tracing::debug!(upload_id = %id, root = %self.root.display(), "Created upload file");
        Ok(key)
    }

    async fn append(&self, key: &StorageKey, bytes: Bytes) -> UploadResult<u64> {
        let path = self
            .resolve(key)
            .await?
            .ok_or_else(|| UploadError::not_found(key.as_str()))?;

        let mut file = OpenOptions::new().append(true).open(&path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        Ok(file.metadata().await?.len())
    }

    async fn size_of(&self, key: &StorageKey) -> UploadResult<Option<u64>> {
        for _ in 0..2 {
            let Some(path) = self.resolve(key).await? else {
                return Ok(None);
            };
            match fs::metadata(&path).await {
                Ok(meta) => return Ok(Some(meta.len())),
                // renamed by finalize between resolve and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    async fn finalize(&self, key: &StorageKey) -> UploadResult<()> {
        let staging = self.staging_path(key)?;
        let finished = self.final_path(key)?;

        match fs::rename(&staging, &finished).await {
            Ok(()) => {
                tracing::debug!(key = %key, path = %finished.display(), "Finalized upload file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if fs::try_exists(&finished).await? {
                    Ok(())
                } else {
                    Err(UploadError::not_found(key.as_str()))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &StorageKey) -> UploadResult<()> {
        for path in [self.staging_path(key)?, self.final_path(key)?] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
