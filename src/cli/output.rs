//! Output formatting for multiple formats
//!
//! JSON and YAML carry the full structures; the human format is a short
//! summary for a terminal.
//!
//! # Example
//!
//! ```ignore
//! use nbdeploy::cli::output::{OutputFormat, OutputFormatter};
//!
//! let formatter = OutputFormatter::new(OutputFormat::Json);
//! let output = formatter.format_plan(&status, artifact.as_ref(), &[])?;
//! println!("{}", output);
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::artifact::DeploymentArtifact;
use crate::detection::EntryPointCandidate;
use crate::secrets::is_sensitive;
use crate::status::{DeploymentStatus, Outcome, StepResult};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of `plan`
    pub fn format_plan(
        &self,
        status: &DeploymentStatus,
        artifact: Option<&DeploymentArtifact>,
        written: &[PathBuf],
    ) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::Yaml => {
                let output = json!({
                    "status": status,
                    "artifact": artifact.map(|a| json!({
                        "id": a.id,
                        "repository": a.repository.to_string(),
                        "commit": a.commit,
                        "steps": a.steps.iter().map(|s| s.label.as_str()).collect::<Vec<_>>(),
                        "secret_keys": a.secret_keys,
                    })),
                    "files": written,
                });
                self.serialize(&output, "plan result")
            }
            OutputFormat::Human => Ok(self.format_plan_human(status, artifact, written)),
        }
    }

    /// Formats ranked detector candidates
    pub fn format_candidates(&self, root: &Path, candidates: &[EntryPointCandidate]) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::Yaml => self.serialize(&candidates, "candidates"),
            OutputFormat::Human => {
                let mut output = String::new();
                output.push_str(&format!("Entry Points in {}\n", root.display()));
                output.push_str(RULE);
                output.push_str("\n\n");

                if candidates.is_empty() {
                    output.push_str("\u{26A0} No web application entry point found\n");
                    return Ok(output);
                }

                for (i, candidate) in candidates.iter().enumerate() {
                    let marker = if i == 0 { "\u{2713}" } else { " " };
                    output.push_str(&format!("{} {}. {}\n", marker, i + 1, candidate));
                    match candidate.target() {
                        Some(target) if candidate.framework_kind.is_recognized() => {
                            output.push_str(&format!("     target: {}\n", target));
                        }
                        _ => output.push_str("     (cannot be started)\n"),
                    }
                }
                Ok(output)
            }
        }
    }

    /// Formats a status after execution signals were ingested
    pub fn format_report(&self, status: &DeploymentStatus) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::Yaml => self.serialize(status, "report"),
            OutputFormat::Human => {
                let mut output = String::new();
                output.push_str("Execution Report\n");
                output.push_str(RULE);
                output.push_str("\n\n");

                if status.step_results.is_empty() {
                    output.push_str("No step signals found in the log\n");
                }
                for step in &status.step_results {
                    let symbol = match step.result {
                        StepResult::Ok => "\u{2713}",
                        StepResult::Skipped => "\u{21B7}",
                        StepResult::Warned => "\u{26A0}",
                        StepResult::Failed => "\u{2717}",
                    };
                    output.push_str(&format!("{} {:<28} {}\n", symbol, step.label, step.result));
                }

                output.push('\n');
                match &status.public_url {
                    Some(url) => output.push_str(&format!("Public URL: {}\n", url)),
                    None => output.push_str("Public URL: (not reported)\n"),
                }
                output.push_str(&format!(
                    "Artifact:   {}\n",
                    if status.artifact_valid { "valid" } else { "invalid" }
                ));
                Ok(output)
            }
        }
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T, what: &str) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)
                .with_context(|| format!("Failed to serialize {} to YAML", what)),
            _ => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what)),
        }
    }

    fn format_plan_human(
        &self,
        status: &DeploymentStatus,
        artifact: Option<&DeploymentArtifact>,
        written: &[PathBuf],
    ) -> String {
        let mut output = String::new();

        let symbol = match status.outcome {
            Outcome::Ready => "\u{2713}",
            Outcome::AmbiguousEntrypoint => "\u{26A0}",
            Outcome::MissingManifest | Outcome::FetchFailed => "\u{2717}",
        };
        output.push_str(&format!("{} Deployment Plan: {}\n", symbol, status.outcome));
        output.push_str(RULE);
        output.push_str("\n\n");

        match &status.chosen_entrypoint {
            Some(entry) => output.push_str(&format!("Entry Point:  {}\n", entry)),
            None => output.push_str("Entry Point:  (none; server must be started by hand)\n"),
        }

        if let Some(artifact) = artifact {
            output.push_str(&format!("Artifact:     {}\n", artifact.id));
            output.push_str(&format!("Repository:   {}\n", artifact.repository));
            if let Some(commit) = &artifact.commit {
                output.push_str(&format!("Commit:       {}\n", commit));
            }
            if !artifact.secret_keys.is_empty() {
                let keys: Vec<String> = artifact
                    .secret_keys
                    .iter()
                    .map(|k| {
                        if is_sensitive(k) {
                            format!("{} (sensitive)", k)
                        } else {
                            k.clone()
                        }
                    })
                    .collect();
                output.push_str(&format!("Secrets:      {}\n", keys.join(", ")));
            }

            output.push_str("\nSteps:\n");
            for (i, step) in artifact.steps.iter().enumerate() {
                let connector = if i + 1 == artifact.steps.len() {
                    "\u{2514}"
                } else {
                    "\u{251C}"
                };
                output.push_str(&format!(
                    "{}\u{2500} {:<28} {}\n",
                    connector, step.label, step.banner
                ));
            }
        }

        if !status.detail_messages.is_empty() {
            output.push_str("\nDetails:\n");
            for message in &status.detail_messages {
                output.push_str(&format!("  - {}\n", message));
            }
        }

        if !written.is_empty() {
            output.push_str("\nWritten:\n");
            for path in written {
                output.push_str(&format!("  {}\n", path.display()));
            }
        }

        output
    }
}
