//! Binary asset hosting for gallery photos.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::error::AppError;

/// Where uploaded photos end up. `upload` returns a durable public URL.
#[async_trait]
pub trait AssetHost: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, AppError>;
}

/// Stores assets on local disk, sharded by the first two characters of the
/// generated key, and hands out URLs under `base_url`.
#[derive(Clone)]
pub struct DiskAssetHost {
    root: PathBuf,
    base_url: String,
}

impl DiskAssetHost {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn key_for(file_name: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        match extension(file_name) {
            Some(ext) => format!("{id}.{ext}"),
            None => id,
        }
    }
}

fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

#[async_trait]
impl AssetHost for DiskAssetHost {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, AppError> {
        if bytes.is_empty() {
            return Err(AppError::Upload(format!("{file_name} is empty")));
        }

        let key = Self::key_for(file_name);
        let shard = &key[..2];
        let dir = self.root.join(shard);

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Upload(format!("failed to create {}: {e}", dir.display())))?;
        fs::write(dir.join(&key), bytes)
            .await
            .map_err(|e| AppError::Upload(format!("failed to write {key}: {e}")))?;

        Ok(format!("{}/{shard}/{key}", self.base_url))
    }
}
