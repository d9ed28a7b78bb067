use super::reference::RepositoryReference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Provenance recorded while fetching
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Commit the working tree was checked out at
    pub commit: Option<String>,
    pub default_branch: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
}

/// A fetched repository on local disk.
///
/// Owns its scratch directory; dropping the tree removes everything under it.
#[derive(Debug)]
pub struct WorkingTree {
    scratch: TempDir,
    root: PathBuf,
    reference: RepositoryReference,
    info: RepositoryInfo,
}

impl WorkingTree {
    pub(crate) fn new(
        scratch: TempDir,
        root: PathBuf,
        reference: RepositoryReference,
        info: RepositoryInfo,
    ) -> Self {
        Self {
            scratch,
            root,
            reference,
            info,
        }
    }

    /// Top of the checkout
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn reference(&self) -> &RepositoryReference {
        &self.reference
    }

    pub fn info(&self) -> &RepositoryInfo {
        &self.info
    }

    /// Provenance the artifact composer needs once the tree is gone
    pub fn provenance(&self) -> (RepositoryReference, RepositoryInfo) {
        (self.reference.clone(), self.info.clone())
    }
}
