//! Source fetching
//!
//! [`SourceFetcher`] validates the reference, creates a per-request scratch
//! directory, and runs a [`RepositoryFetcher`] under a timeout. The resulting
//! [`WorkingTree`] owns the scratch directory, so it is removed on every exit
//! path, including when a later planning stage fails.

mod fixture;
mod git;
mod reference;
mod working_tree;

pub use fixture::StaticFetcher;
pub use git::GitFetcher;
pub use reference::RepositoryReference;
pub use working_tree::{RepositoryInfo, WorkingTree};

use crate::error::FetchError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Materialises a repository into `dest`, which does not exist yet
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn fetch(
        &self,
        reference: &RepositoryReference,
        dest: &Path,
    ) -> Result<RepositoryInfo, FetchError>;
}

pub struct SourceFetcher {
    fetcher: Arc<dyn RepositoryFetcher>,
    temp_root: PathBuf,
    timeout: Duration,
}

impl SourceFetcher {
    pub fn new(fetcher: Arc<dyn RepositoryFetcher>, temp_root: PathBuf, timeout: Duration) -> Self {
        Self {
            fetcher,
            temp_root,
            timeout,
        }
    }

    /// Fetches `raw_reference` into a fresh scratch directory
    ///
    /// # Errors
    ///
    /// `InvalidReference` before any I/O for a malformed reference, `Network`
    /// on timeout or local I/O failure, otherwise whatever the fetcher reports
    pub async fn fetch(&self, raw_reference: &str) -> Result<WorkingTree, FetchError> {
        let reference = RepositoryReference::parse(raw_reference)?;

        std::fs::create_dir_all(&self.temp_root).map_err(|e| {
            FetchError::Network(format!(
                "cannot create temp root {}: {}",
                self.temp_root.display(),
                e
            ))
        })?;

        let scratch = tempfile::Builder::new()
            .prefix(&format!("nbdeploy-{}-", Uuid::new_v4()))
            .tempdir_in(&self.temp_root)
            .map_err(|e| FetchError::Network(format!("cannot create scratch directory: {}", e)))?;

        let root = scratch.path().join(&reference.repo);
        debug!(repo = %reference, scratch = %scratch.path().display(), "Fetching repository");

        let info = match tokio::time::timeout(self.timeout, self.fetcher.fetch(&reference, &root)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Network(format!(
                    "fetch of {} timed out after {}s",
                    reference.slug(),
                    self.timeout.as_secs_f64()
                )))
            }
        };

        info!(repo = %reference, "Working tree ready");
        Ok(WorkingTree::new(scratch, root, reference, info))
    }
}
