//! Error taxonomy for deployment planning
//!
//! Hard failures (`FetchError`, `ConfigError`) are ordinary `thiserror` enums.
//! `DeploymentIssue` is the wider set of things a planning run can run into;
//! its `Display` text is what ends up in `DeploymentStatus::detail_messages`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a repository could not be materialised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchErrorReason {
    NotPublic,
    NotFound,
    Network,
    /// Rejected before any network access
    InvalidReference,
}

impl fmt::Display for FetchErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchErrorReason::NotPublic => "NOT_PUBLIC",
            FetchErrorReason::NotFound => "NOT_FOUND",
            FetchErrorReason::Network => "NETWORK",
            FetchErrorReason::InvalidReference => "INVALID_REFERENCE",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("repository is not public: {0}")]
    NotPublic(String),

    #[error("repository not found (or private): {0}")]
    NotFound(String),

    #[error("network failure while fetching repository: {0}")]
    Network(String),

    #[error("not a repository reference: {0}")]
    InvalidReference(String),
}

impl FetchError {
    pub fn reason(&self) -> FetchErrorReason {
        match self {
            FetchError::NotPublic(_) => FetchErrorReason::NotPublic,
            FetchError::NotFound(_) => FetchErrorReason::NotFound,
            FetchError::Network(_) => FetchErrorReason::Network,
            FetchError::InvalidReference(_) => FetchErrorReason::InvalidReference,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Why a secret line was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretLineIssue {
    MissingSeparator,
    EmptyKey,
    InvalidKey(String),
}

impl fmt::Display for SecretLineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretLineIssue::MissingSeparator => write!(f, "expected KEY=VALUE"),
            SecretLineIssue::EmptyKey => write!(f, "empty variable name"),
            SecretLineIssue::InvalidKey(key) => {
                write!(f, "'{}' is not a valid variable name", key)
            }
        }
    }
}

/// Everything a planning run can surface to the caller, in discovery order
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeploymentIssue {
    #[error("fetch failed ({reason}): {0}", reason = .0.reason())]
    Fetch(FetchError),

    #[error("{}", describe_ambiguity(.candidates, .best_confidence, .min_confidence))]
    DetectionAmbiguous {
        candidates: usize,
        best_confidence: Option<u32>,
        min_confidence: u32,
    },

    #[error("manifest has no installable entries")]
    ManifestEmpty,

    #[error("warning: env line {line} dropped: {issue}")]
    SecretParseWarning { line: usize, issue: SecretLineIssue },

    #[error("install of '{package}' failed ({})", install_severity(.fatal))]
    InstallFailed { package: String, fatal: bool },
}

fn install_severity(fatal: &bool) -> &'static str {
    if *fatal {
        "fatal"
    } else {
        "warned"
    }
}

fn describe_ambiguity(candidates: &usize, best: &Option<u32>, min: &u32) -> String {
    match best {
        None => "no web application entry point found; start-server step omitted".to_string(),
        Some(score) => format!(
            "entry point ambiguous: best of {} candidate(s) scored {} (< {}); start-server step omitted",
            candidates, score, min
        ),
    }
}
