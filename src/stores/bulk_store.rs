//! Hierarchical file storage that exported files are uploaded into.

use crate::config::BulkStoreConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// A remote hierarchical file store.
///
/// Paths inside the store are absolute, `/`-separated strings such as
/// `/user/student/data.csv`.
#[async_trait]
pub trait BulkStore: Send + Sync {
  /// Copies the local file at `local` to `remote`.
  ///
  /// Fails with [`PipelineError::Upload`] when `local` cannot be read, when the
  /// transfer fails, or when `remote` already exists and `overwrite` is false.
  async fn upload(&self, local: &Path, remote: &str, overwrite: bool) -> Result<()>;

  /// Reports whether a file exists at `remote`.
  async fn exists(&self, remote: &str) -> Result<bool>;

  /// Reads the whole file at `remote`.
  async fn read(&self, remote: &str) -> Result<Vec<u8>>;

  /// Deletes the file at `remote`.
  async fn remove(&self, remote: &str) -> Result<()>;
}

/// A bulk store backed by a local directory.
///
/// `/a/b.csv` inside the store lives at `<root>/a/b.csv` on disk.
#[derive(Debug, Clone)]
pub struct LocalBulkStore {
  root: PathBuf,
}

impl LocalBulkStore {
  /// Creates a store rooted at `root`. The directory is created on first upload.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Creates a store from configuration.
  pub fn from_config(config: &BulkStoreConfig) -> Self {
    Self::new(config.root.clone())
  }

  /// Directory backing the store.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Maps a store path onto the backing directory.
  ///
  /// Only plain path segments are accepted; `..` and similar are rejected so
  /// nothing resolves outside the root.
  fn resolve(&self, remote: &str) -> std::result::Result<PathBuf, String> {
    let relative = Path::new(remote.trim_start_matches('/'));
    if relative.as_os_str().is_empty() {
      return Err("empty store path".to_string());
    }
    if !relative
      .components()
      .all(|c| matches!(c, Component::Normal(_)))
    {
      return Err(format!("invalid store path `{}`", remote));
    }
    Ok(self.root.join(relative))
  }

  fn store_error(remote: &str, reason: impl std::fmt::Display) -> PipelineError {
    PipelineError::BulkStore {
      path: remote.to_string(),
      reason: reason.to_string(),
    }
  }
}

#[async_trait]
impl BulkStore for LocalBulkStore {
  async fn upload(&self, local: &Path, remote: &str, overwrite: bool) -> Result<()> {
    let upload_error = |reason: String| PipelineError::Upload {
      local: local.to_path_buf(),
      remote: remote.to_string(),
      reason,
    };

    let target = self.resolve(remote).map_err(upload_error)?;

    let metadata = tokio::fs::metadata(local)
      .await
      .map_err(|e| upload_error(format!("cannot read local file: {}", e)))?;
    if !metadata.is_file() {
      return Err(upload_error("local path is not a file".to_string()));
    }

    if !overwrite {
      let exists = self
        .exists(remote)
        .await
        .map_err(|e| upload_error(format!("cannot check target: {}", e)))?;
      if exists {
        return Err(upload_error("target exists and overwrite is disabled".to_string()));
      }
    }

    if let Some(parent) = target.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| upload_error(e.to_string()))?;
    }

    let bytes = tokio::fs::copy(local, &target)
      .await
      .map_err(|e| upload_error(e.to_string()))?;

    info!(
      local = %local.display(),
      remote = %remote,
      bytes,
      "Uploaded file to bulk store"
    );
    Ok(())
  }

  async fn exists(&self, remote: &str) -> Result<bool> {
    let target = self
      .resolve(remote)
      .map_err(|reason| Self::store_error(remote, reason))?;
    tokio::fs::try_exists(&target)
      .await
      .map_err(|e| Self::store_error(remote, e))
  }

  async fn read(&self, remote: &str) -> Result<Vec<u8>> {
    let target = self
      .resolve(remote)
      .map_err(|reason| Self::store_error(remote, reason))?;
    tokio::fs::read(&target)
      .await
      .map_err(|e| Self::store_error(remote, e))
  }

  async fn remove(&self, remote: &str) -> Result<()> {
    let target = self
      .resolve(remote)
      .map_err(|reason| Self::store_error(remote, reason))?;
    tokio::fs::remove_file(&target)
      .await
      .map_err(|e| Self::store_error(remote, e))?;
    debug!(remote = %remote, "Removed file from bulk store");
    Ok(())
  }
}
