//! Local filesystem blob storage for uploaded media.
//!
//! Files are stored flat under the upload directory with generated names and
//! are addressed by public URL. Content entries only ever hold that URL.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::AppError;

/// Longest file extension kept from an uploaded file name.
const MAX_EXTENSION_LEN: usize = 10;

/// Result of storing a blob.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub url: String,
    pub name: String,
    pub size: usize,
}

/// Blob store backed by a directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    public_url: String,
}

impl BlobStore {
    /// Open the store, creating its directory if needed.
    pub async fn open(root: &Path, public_url: &str) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            AppError::Storage(format!("Failed to create upload directory: {}", e))
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Store `bytes` under a generated name, keeping the original extension.
    pub async fn store(&self, filename: Option<&str>, bytes: &[u8]) -> Result<StoredBlob, AppError> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Upload body is empty".to_string()));
        }

        let name = match filename.and_then(extension_of) {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };

        tokio::fs::write(self.root.join(&name), bytes).await?;

        let blob = StoredBlob {
            url: format!("{}/{}", self.public_url, name),
            name,
            size: bytes.len(),
        };
        tracing::info!(url = %blob.url, size = blob.size, "Blob stored");
        Ok(blob)
    }

    /// Delete the blob a public URL points to.
    pub async fn delete(&self, url: &str) -> Result<(), AppError> {
        let name = self.name_from_url(url)?;

        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => {
                tracing::info!(url = %url, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("File {} not found", url)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Map a public URL back to a bare file name in the store.
    fn name_from_url<'a>(&self, url: &'a str) -> Result<&'a str, AppError> {
        let name = url
            .strip_prefix(self.public_url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| AppError::BadRequest(format!("{} is not an uploaded file", url)))?;

        let bare = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && name != "..";
        if !bare {
            return Err(AppError::BadRequest(format!("{} is not an uploaded file", url)));
        }
        Ok(name)
    }
}

/// Lowercased alphanumeric extension of a client file name.
fn extension_of(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    let ext: String = ext
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_EXTENSION_LEN)
        .collect();
    (!ext.is_empty()).then_some(ext)
}
