//! Binary store for uploaded crop images
//!
//! Files are written under `<base>/uploads/` with a uuid filename whose
//! extension is derived from the content type. Record-level cleanup ordering
//! (delete the binary when record creation fails, and vice versa) is the
//! caller's responsibility; this store only saves and deletes bytes.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to a stored binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBinary {
    /// Filesystem path of the stored file
    pub path: PathBuf,
    /// URL the file is served from
    pub url: String,
    /// Size in bytes
    pub size: u64,
    /// Content type supplied at upload
    pub content_type: String,
}

/// File-backed binary store
pub struct BinaryStore {
    uploads_dir: PathBuf,
}

impl BinaryStore {
    /// Create a binary store under the given base directory
    pub async fn new(base_dir: &Path) -> std::io::Result<Self> {
        let uploads_dir = base_dir.join("uploads");
        tokio::fs::create_dir_all(&uploads_dir).await?;
        Ok(Self { uploads_dir })
    }

    /// Persist bytes, returning a reference to the stored file
    pub async fn save(&self, bytes: Bytes, content_type: &str) -> Result<StoredBinary> {
        let ext = extension_for(content_type);
        let filename = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        let path = self.uploads_dir.join(&filename);

        let size = bytes.len() as u64;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| Error::Storage(format!("failed to write {}: {}", path.display(), e)))?;

        Ok(StoredBinary {
            path,
            url: format!("/uploads/{}", filename),
            size,
            content_type: content_type.to_string(),
        })
    }

    /// Delete a stored file; missing files are not an error
    pub async fn delete(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}
