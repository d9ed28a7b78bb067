//! Deployment status reporting
//!
//! [`StatusReporter`] collects decisions and issues in the order the planner
//! runs into them and folds them into one [`DeploymentStatus`]. It never
//! re-derives anything; the outcome follows from the issues it was handed.
//! [`ExecutionReport`] reads the signal lines a run of the artifact prints so
//! their results can be appended to a status afterwards.

mod execution;

pub use execution::{ExecutionReport, StepResult, StepSignal};

use crate::artifact::{DeploymentArtifact, StepPurpose};
use crate::detection::EntryPointCandidate;
use crate::error::DeploymentIssue;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Overall planning outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Ready,
    AmbiguousEntrypoint,
    MissingManifest,
    FetchFailed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ready => "READY",
            Outcome::AmbiguousEntrypoint => "AMBIGUOUS_ENTRYPOINT",
            Outcome::MissingManifest => "MISSING_MANIFEST",
            Outcome::FetchFailed => "FETCH_FAILED",
        }
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Ready => 0,
            Outcome::AmbiguousEntrypoint => 2,
            Outcome::MissingManifest | Outcome::FetchFailed => 1,
        }
    }

    /// Whether an artifact accompanies this outcome
    pub fn has_artifact(&self) -> bool {
        matches!(self, Outcome::Ready | Outcome::AmbiguousEntrypoint)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary handed back with every planning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub outcome: Outcome,
    /// Every decision and warning, in discovery order
    pub detail_messages: Vec<String>,
    pub chosen_entrypoint: Option<EntryPointCandidate>,
    /// False once a fatal failure is known, either at planning or at execution
    pub artifact_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_results: Vec<StepSignal>,
}

impl DeploymentStatus {
    pub fn is_ready(&self) -> bool {
        self.outcome == Outcome::Ready
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// Append-only log of what happened during one planning run
#[derive(Debug, Default)]
pub struct StatusReporter {
    messages: Vec<String>,
    issues: Vec<DeploymentIssue>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decision
    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(detail = %message, "Status note");
        self.messages.push(message);
    }

    /// Records an issue; its text becomes a detail message
    pub fn issue(&mut self, issue: DeploymentIssue) {
        warn!(issue = %issue, "Deployment issue");
        self.messages.push(issue.to_string());
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[DeploymentIssue] {
        &self.issues
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Outcome implied by the recorded issues.
    ///
    /// Fetch failures win over an empty manifest, which wins over ambiguity.
    pub fn outcome(&self) -> Outcome {
        let has = |pred: fn(&DeploymentIssue) -> bool| self.issues.iter().any(pred);
        if has(|i| matches!(i, DeploymentIssue::Fetch(_))) {
            Outcome::FetchFailed
        } else if has(|i| matches!(i, DeploymentIssue::ManifestEmpty)) {
            Outcome::MissingManifest
        } else if has(|i| matches!(i, DeploymentIssue::DetectionAmbiguous { .. })) {
            Outcome::AmbiguousEntrypoint
        } else {
            Outcome::Ready
        }
    }

    pub fn finish(self, chosen_entrypoint: Option<EntryPointCandidate>) -> DeploymentStatus {
        let outcome = self.outcome();
        let artifact_valid = outcome.has_artifact()
            && !self
                .issues
                .iter()
                .any(|i| matches!(i, DeploymentIssue::InstallFailed { fatal: true, .. }));
        DeploymentStatus {
            outcome,
            detail_messages: self.messages,
            chosen_entrypoint,
            artifact_valid,
            public_url: None,
            step_results: Vec::new(),
        }
    }

    /// Appends the results of an execution run to `status`.
    ///
    /// Every failed install step becomes an `InstallFailed` message. Its
    /// severity comes from the artifact when given; without one a failure is
    /// treated as fatal. `warned` installs succeeded through their fallback.
    pub fn ingest_execution(
        status: &mut DeploymentStatus,
        artifact: Option<&DeploymentArtifact>,
        report: &ExecutionReport,
    ) {
        for signal in &report.steps {
            let step = artifact.and_then(|a| a.step(&signal.label));
            let is_install = match step {
                Some(step) => step.purpose == StepPurpose::Install,
                None => install_package(&signal.label).is_some(),
            };
            let fatal = step.map_or(true, |s| s.recovery.fatal_on_failure);

            status
                .detail_messages
                .push(format!("step {}: {}", signal.label, signal.result));

            if signal.result != StepResult::Failed {
                continue;
            }
            if is_install {
                let package = install_package(&signal.label)
                    .unwrap_or(signal.label.as_str())
                    .to_string();
                let issue = DeploymentIssue::InstallFailed { package, fatal };
                status.detail_messages.push(issue.to_string());
            }
            if fatal {
                status.artifact_valid = false;
            }
        }
        status.step_results.extend(report.steps.iter().cloned());

        if let Some(url) = &report.public_url {
            status
                .detail_messages
                .push(format!("public URL: {}", url));
            status.public_url = Some(url.clone());
        }
    }
}

/// Package name of an install step label such as `03-install-fastapi`
fn install_package(label: &str) -> Option<&str> {
    let (_, rest) = label.split_once('-')?;
    rest.strip_prefix("install-")
}
