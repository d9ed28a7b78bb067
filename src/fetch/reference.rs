use crate::error::FetchError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$")
            .expect("valid regex")
    })
}

/// A public GitHub repository, `https://github.com/<owner>/<repo>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub owner: String,
    pub repo: String,
}

impl RepositoryReference {
    /// Parses a repository URL without touching the network
    ///
    /// # Errors
    ///
    /// `FetchError::InvalidReference` for anything that is not a GitHub
    /// repository URL
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        let trimmed = input.trim();
        let caps = reference_regex()
            .captures(trimmed)
            .ok_or_else(|| FetchError::InvalidReference(trimmed.to_string()))?;

        let owner = caps[1].to_string();
        let repo = caps[2].to_string();

        if [&owner, &repo].iter().any(|s| s.chars().all(|c| c == '.')) {
            return Err(FetchError::InvalidReference(trimmed.to_string()));
        }

        Ok(Self { owner, repo })
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }

    pub fn api_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://github.com/{}/{}", self.owner, self.repo)
    }
}
