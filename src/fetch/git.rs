//! Clone-by-reference through the `git` binary

use super::reference::RepositoryReference;
use super::working_tree::RepositoryInfo;
use super::RepositoryFetcher;
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const API_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("nbdeploy/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GithubRepository {
    #[serde(default)]
    private: bool,
    default_branch: Option<String>,
    description: Option<String>,
    language: Option<String>,
}

/// Checks visibility through the GitHub REST API, then shallow-clones
pub struct GitFetcher {
    client: Client,
    api_base: String,
    verify_visibility: bool,
    git_binary: String,
}

impl GitFetcher {
    pub fn new(api_base: impl Into<String>, verify_visibility: bool) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(API_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            verify_visibility,
            git_binary: "git".to_string(),
        }
    }

    pub fn with_git_binary(mut self, binary: impl Into<String>) -> Self {
        self.git_binary = binary.into();
        self
    }

    async fn check_visibility(
        &self,
        reference: &RepositoryReference,
    ) -> Result<RepositoryInfo, FetchError> {
        let url = format!("{}{}", self.api_base, reference.api_path());
        debug!(%url, "Checking repository visibility");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("GitHub API request failed: {}", e)))?;

        let status = response.status();
        if let Some(outcome) = classify_api_status(status, reference) {
            return outcome;
        }

        let repo: GithubRepository = response
            .json()
            .await
            .map_err(|e| FetchError::Network(format!("unreadable GitHub API response: {}", e)))?;

        if repo.private {
            return Err(FetchError::NotPublic(reference.slug()));
        }

        Ok(RepositoryInfo {
            commit: None,
            default_branch: repo.default_branch,
            description: repo.description,
            language: repo.language,
        })
    }

    async fn clone_into(
        &self,
        reference: &RepositoryReference,
        dest: &Path,
    ) -> Result<(), FetchError> {
        let output = Command::new(&self.git_binary)
            .args(["clone", "--depth", "1", "--quiet"])
            .arg(reference.clone_url())
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FetchError::Network(format!("failed to run git: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(repo = %reference, stderr = %stderr.trim(), "git clone failed");
        Err(classify_clone_failure(&stderr, reference))
    }

    async fn head_commit(&self, dest: &Path) -> Option<String> {
        let output = Command::new(&self.git_binary)
            .args(["rev-parse", "HEAD"])
            .current_dir(dest)
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!commit.is_empty()).then_some(commit)
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(
        &self,
        reference: &RepositoryReference,
        dest: &Path,
    ) -> Result<RepositoryInfo, FetchError> {
        let mut info = if self.verify_visibility {
            self.check_visibility(reference).await?
        } else {
            RepositoryInfo::default()
        };

        self.clone_into(reference, dest).await?;
        info.commit = self.head_commit(dest).await;

        info!(
            repo = %reference,
            commit = info.commit.as_deref().unwrap_or("unknown"),
            "Repository cloned"
        );
        Ok(info)
    }
}

/// `None` means the response is a success and should be read
fn classify_api_status(
    status: StatusCode,
    reference: &RepositoryReference,
) -> Option<Result<RepositoryInfo, FetchError>> {
    if status.is_success() {
        return None;
    }
    let outcome = match status {
        StatusCode::NOT_FOUND => Err(FetchError::NotFound(format!(
            "{} (not found or private)",
            reference.slug()
        ))),
        StatusCode::UNAUTHORIZED => Err(FetchError::NotPublic(reference.slug())),
        // Rate limited: visibility unknown, let the clone decide
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            warn!(repo = %reference, %status, "GitHub API refused the visibility check; cloning anyway");
            Ok(RepositoryInfo::default())
        }
        other => Err(FetchError::Network(format!(
            "GitHub API answered {} for {}",
            other,
            reference.slug()
        ))),
    };
    Some(outcome)
}

fn classify_clone_failure(stderr: &str, reference: &RepositoryReference) -> FetchError {
    let lower = stderr.to_lowercase();
    if lower.contains("could not read username")
        || lower.contains("authentication failed")
        || lower.contains("terminal prompts disabled")
        || lower.contains("permission denied")
    {
        FetchError::NotPublic(reference.slug())
    } else if lower.contains("not found") || lower.contains("does not exist") {
        FetchError::NotFound(reference.slug())
    } else {
        let detail = stderr.trim().lines().last().unwrap_or("git clone failed");
        FetchError::Network(format!("{}: {}", reference.slug(), detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorReason;

    fn reference() -> RepositoryReference {
        RepositoryReference::parse("https://github.com/octo/app").unwrap()
    }

    #[test]
    fn test_api_status_classification() {
        let r = reference();
        assert!(classify_api_status(StatusCode::OK, &r).is_none());

        let not_found = classify_api_status(StatusCode::NOT_FOUND, &r).unwrap();
        assert_eq!(not_found.unwrap_err().reason(), FetchErrorReason::NotFound);

        let unauthorized = classify_api_status(StatusCode::UNAUTHORIZED, &r).unwrap();
        assert_eq!(unauthorized.unwrap_err().reason(), FetchErrorReason::NotPublic);

        let limited = classify_api_status(StatusCode::FORBIDDEN, &r).unwrap();
        assert!(limited.is_ok());

        let broken = classify_api_status(StatusCode::BAD_GATEWAY, &r).unwrap();
        assert_eq!(broken.unwrap_err().reason(), FetchErrorReason::Network);
    }

    #[test]
    fn test_clone_failure_classification() {
        let r = reference();
        let cases = [
            (
                "fatal: could not read Username for 'https://github.com': terminal prompts disabled",
                FetchErrorReason::NotPublic,
            ),
            (
                "remote: Repository not found.\nfatal: repository 'https://github.com/octo/app.git/' not found",
                FetchErrorReason::NotFound,
            ),
            (
                "fatal: unable to access 'https://github.com/octo/app.git/': Could not resolve host: github.com",
                FetchErrorReason::Network,
            ),
        ];
        for (stderr, expected) in cases {
            assert_eq!(classify_clone_failure(stderr, &r).reason(), expected, "{}", stderr);
        }
    }

    #[test]
    fn test_github_payload_parsing() {
        let payload = r#"{"private": false, "default_branch": "main", "language": "Python", "description": null}"#;
        let repo: GithubRepository = serde_json::from_str(payload).unwrap();
        assert!(!repo.private);
        assert_eq!(repo.default_branch.as_deref(), Some("main"));
        assert_eq!(repo.language.as_deref(), Some("Python"));
    }

    #[tokio::test]
    async fn test_missing_git_binary_is_network_error() {
        let fetcher = GitFetcher::new("http://127.0.0.1:9", false)
            .with_git_binary("definitely-not-a-real-git-binary");
        let dest = tempfile::tempdir().unwrap();

        let err = fetcher
            .fetch(&reference(), &dest.path().join("app"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), FetchErrorReason::Network);
    }
}
