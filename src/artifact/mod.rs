//! Deployment artifacts
//!
//! A [`DeploymentArtifact`] is an ordered list of [`DeploymentStep`]s, each a
//! standalone bash script with a human-readable banner and a recovery policy.
//! The [`ArtifactComposer`] builds it; [`render`] turns it into a notebook or
//! a single shell script.

mod composer;
pub mod render;
pub mod script;

pub use composer::{ArtifactComposer, ComposeInput};

use crate::detection::EntryPointCandidate;
use crate::fetch::RepositoryReference;
use crate::manifest::DependencyPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a step is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepPurpose {
    Fetch,
    InjectSecrets,
    Install,
    StartTunnel,
    StartServer,
    ReportUrl,
}

impl StepPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepPurpose::Fetch => "fetch",
            StepPurpose::InjectSecrets => "inject-secrets",
            StepPurpose::Install => "install",
            StepPurpose::StartTunnel => "start-tunnel",
            StepPurpose::StartServer => "start-server",
            StepPurpose::ReportUrl => "report-url",
        }
    }

    /// Whether completion is recorded with a marker file
    pub fn is_durable(&self) -> bool {
        matches!(
            self,
            StepPurpose::Fetch | StepPurpose::InjectSecrets | StepPurpose::Install
        )
    }
}

impl fmt::Display for StepPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a step fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Additional attempts after the first
    pub retry_count: u32,
    /// A failure stops the whole run
    pub fatal_on_failure: bool,
    /// Spec used for the retry of an install step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl RecoveryPolicy {
    pub fn fatal(retry_count: u32) -> Self {
        Self {
            retry_count,
            fatal_on_failure: true,
            fallback: None,
        }
    }

    pub fn best_effort(retry_count: u32) -> Self {
        Self {
            retry_count,
            fatal_on_failure: false,
            fallback: None,
        }
    }
}

/// One independently runnable unit of the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    /// 1-based position
    pub index: usize,
    /// Unique label such as `03-install-fastapi`
    pub label: String,
    pub purpose: StepPurpose,
    /// Human-readable description; never contains secret values
    pub banner: String,
    /// Standalone bash program
    pub script: String,
    pub recovery: RecoveryPolicy,
}

/// The executable deployment plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentArtifact {
    /// Content fingerprint over step labels and scripts
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub repository: RepositoryReference,
    pub commit: Option<String>,
    pub entrypoint: Option<EntryPointCandidate>,
    pub dependency_plan: DependencyPlan,
    /// Names of injected variables
    pub secret_keys: Vec<String>,
    pub server_port: u16,
    pub steps: Vec<DeploymentStep>,
}

impl DeploymentArtifact {
    pub fn step(&self, label: &str) -> Option<&DeploymentStep> {
        self.steps.iter().find(|s| s.label == label)
    }

    pub fn steps_for(&self, purpose: StepPurpose) -> impl Iterator<Item = &DeploymentStep> {
        self.steps.iter().filter(move |s| s.purpose == purpose)
    }

    pub fn has_step(&self, purpose: StepPurpose) -> bool {
        self.steps_for(purpose).next().is_some()
    }

    pub fn purposes(&self) -> Vec<StepPurpose> {
        self.steps.iter().map(|s| s.purpose).collect()
    }

    /// Base name for rendered files, e.g. `deploy-my-api`
    pub fn file_stem(&self) -> String {
        let name: String = self
            .repository
            .repo
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        format!("deploy-{}", name.trim_matches('-'))
    }
}
