//! Local file store
//!
//! Files are raw bytes under `<root>/uploaded_<ip>_<client port>/<name>`. No
//! index or integrity metadata is kept.

use crate::common::{validate_file_name, Error, NodeIdentity, Result};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(root: &Path, identity: &NodeIdentity) -> Self {
        Self {
            dir: root.join(identity.upload_dir()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `name` inside the store. Rejects names that would escape it.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_file_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Create the storage directory if needed
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| Error::Create {
                path: self.dir.clone(),
                source,
            })
    }

    /// Write `content` as the whole of `name`, replacing any previous file.
    pub async fn write_whole(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.path_of(name)?;
        self.ensure_dir().await?;

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| Error::Create {
                path: path.clone(),
                source,
            })?;

        let written = async {
            use tokio::io::AsyncWriteExt;
            file.write_all(content).await?;
            file.sync_all().await
        };
        written.await.map_err(|source| Error::Write {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    pub async fn read(&self, name: &str) -> Result<Bytes> {
        let path = self.path_of(name)?;
        read_file(&path, name).await
    }
}

/// Read a whole file. A missing file maps to `FileNotFound(label)`.
pub async fn read_file(path: &Path, label: &str) -> Result<Bytes> {
    match tokio::fs::read(path).await {
        Ok(content) => Ok(Bytes::from(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::FileNotFound(label.to_string())),
        Err(e) => Err(Error::Io(e)),
    }
}
