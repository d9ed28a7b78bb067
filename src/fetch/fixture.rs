use super::reference::RepositoryReference;
use super::working_tree::RepositoryInfo;
use super::RepositoryFetcher;
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Fixture {
    Files(Vec<(String, String)>, RepositoryInfo),
    Failure(FetchError),
}

/// Serves repositories from in-memory file maps. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    fixtures: HashMap<String, Fixture>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `owner/repo` with the given relative paths and contents
    pub fn with_repository<P, C>(mut self, slug: &str, files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(p, c)| (p.into(), c.into()))
            .collect();
        let info = RepositoryInfo {
            commit: Some(fixture_commit(slug)),
            default_branch: Some("main".to_string()),
            ..Default::default()
        };
        self.fixtures
            .insert(slug.to_string(), Fixture::Files(files, info));
        self
    }

    pub fn with_failure(mut self, slug: &str, error: FetchError) -> Self {
        self.fixtures.insert(slug.to_string(), Fixture::Failure(error));
        self
    }

    /// Sleeps before answering, to exercise fetch timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches that reached this fetcher
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Stable fake commit id so identical fixtures plan identical artifacts
fn fixture_commit(slug: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(slug.as_bytes());
    hex::encode(&digest[..20])
}

#[async_trait]
impl RepositoryFetcher for StaticFetcher {
    async fn fetch(
        &self,
        reference: &RepositoryReference,
        dest: &Path,
    ) -> Result<RepositoryInfo, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.fixtures.get(&reference.slug()) {
            None => Err(FetchError::NotFound(reference.slug())),
            Some(Fixture::Failure(err)) => Err(err.clone()),
            Some(Fixture::Files(files, info)) => {
                tokio::fs::create_dir_all(dest)
                    .await
                    .map_err(|e| FetchError::Network(format!("cannot create checkout: {}", e)))?;
                for (relative, content) in files {
                    let path = dest.join(relative);
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await.map_err(|e| {
                            FetchError::Network(format!("cannot create {}: {}", parent.display(), e))
                        })?;
                    }
                    tokio::fs::write(&path, content).await.map_err(|e| {
                        FetchError::Network(format!("cannot write {}: {}", path.display(), e))
                    })?;
                }
                Ok(info.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorReason;

    #[tokio::test]
    async fn test_writes_files() {
        let fetcher =
            StaticFetcher::new().with_repository("octo/app", [("main.py", "x = 1"), ("pkg/a.py", "")]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app");
        let reference = RepositoryReference::parse("https://github.com/octo/app").unwrap();

        let info = fetcher.fetch(&reference, &dest).await.unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("main.py")).unwrap(), "x = 1");
        assert!(dest.join("pkg/a.py").is_file());
        assert_eq!(info.commit.as_ref().map(|c| c.len()), Some(40));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_failing_repositories() {
        let fetcher = StaticFetcher::new()
            .with_failure("octo/secret", FetchError::NotPublic("octo/secret".into()));
        let dir = tempfile::tempdir().unwrap();

        let unknown = RepositoryReference::parse("https://github.com/octo/nope").unwrap();
        let err = fetcher.fetch(&unknown, dir.path()).await.unwrap_err();
        assert_eq!(err.reason(), FetchErrorReason::NotFound);

        let secret = RepositoryReference::parse("https://github.com/octo/secret").unwrap();
        let err = fetcher.fetch(&secret, dir.path()).await.unwrap_err();
        assert_eq!(err.reason(), FetchErrorReason::NotPublic);
    }
}
