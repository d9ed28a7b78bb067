//! Renderers for [`DeploymentArtifact`]
//!
//! - [`to_notebook`]: Jupyter notebook, one markdown banner and one `%%bash`
//!   cell per step, so a single step can be re-run by hand
//! - [`to_shell_script`]: one script running every step in order, stopping at
//!   the first fatal failure
//! - [`to_json`]: the artifact itself

use super::{DeploymentArtifact, DeploymentStep};
use anyhow::{Context, Result};
use serde_json::{json, Value};

/// Jupyter notebook (nbformat 4) for the artifact
pub fn to_notebook(artifact: &DeploymentArtifact) -> Value {
    let mut cells = vec![markdown_cell(&title(artifact))];

    for step in &artifact.steps {
        cells.push(markdown_cell(&format!(
            "### Step {}: `{}`\n\n{}\n\n{}",
            step.index,
            step.label,
            step.banner,
            recovery_note(step)
        )));
        cells.push(code_cell(&format!("%%bash\n{}", step.script)));
    }

    json!({
        "cells": cells,
        "metadata": {
            "kernelspec": {
                "display_name": "Python 3",
                "language": "python",
                "name": "python3"
            },
            "language_info": { "name": "python" },
            "nbdeploy": {
                "artifact_id": artifact.id,
                "repository": artifact.repository.to_string(),
                "commit": artifact.commit,
            }
        },
        "nbformat": 4,
        "nbformat_minor": 4
    })
}

/// Single bash script running every step in order
pub fn to_shell_script(artifact: &DeploymentArtifact) -> String {
    let mut out = String::new();
    out.push_str("#!/usr/bin/env bash\n");
    out.push_str(&format!("# Deployment of {}\n", artifact.repository));
    out.push_str(&format!("# Artifact {}\n", artifact.id));
    out.push_str("set -uo pipefail\n\n");

    for step in &artifact.steps {
        let delimiter = format!("NBDEPLOY_STEP_{:02}", step.index);
        out.push_str(&format!("# {}: {}\n", step.label, step.banner));
        out.push_str(&format!("echo '==> {}'\n", step.label));
        out.push_str(&format!("bash <<'{}'\n", delimiter));
        out.push_str(&step.script);
        if !step.script.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("{}\n", delimiter));
        out.push_str("rc=$?\n");
        if step.recovery.fatal_on_failure {
            out.push_str(&format!(
                "if [ \"$rc\" -ne 0 ]; then echo '{} failed, stopping' >&2; exit \"$rc\"; fi\n\n",
                step.label
            ));
        } else {
            out.push_str(&format!(
                "if [ \"$rc\" -ne 0 ]; then echo '{} failed, continuing' >&2; fi\n\n",
                step.label
            ));
        }
    }

    out
}

pub fn to_json(artifact: &DeploymentArtifact) -> Result<String> {
    serde_json::to_string_pretty(artifact).context("Failed to serialize artifact to JSON")
}

fn title(artifact: &DeploymentArtifact) -> String {
    let mut text = format!("# Deploy {}\n\n", artifact.repository);
    if let Some(commit) = &artifact.commit {
        text.push_str(&format!("Commit `{}`. ", commit));
    }
    match &artifact.entrypoint {
        Some(entry) => text.push_str(&format!(
            "Serves `{}` on port {}.",
            entry, artifact.server_port
        )),
        None => text.push_str(
            "No entry point was resolved; the server has to be started by hand.",
        ),
    }
    text.push_str("\n\nRun the cells top to bottom. Finished steps are skipped on a re-run.");
    text
}

fn recovery_note(step: &DeploymentStep) -> String {
    let policy = &step.recovery;
    let mut note = if policy.fatal_on_failure {
        "Failure stops the deployment.".to_string()
    } else {
        "Failure is reported as a warning.".to_string()
    };
    if policy.retry_count > 0 {
        note.push_str(&format!(" Retried up to {} time(s).", policy.retry_count));
    }
    note
}

fn source_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

fn markdown_cell(text: &str) -> Value {
    json!({
        "cell_type": "markdown",
        "metadata": {},
        "source": source_lines(text)
    })
}

fn code_cell(text: &str) -> Value {
    json!({
        "cell_type": "code",
        "execution_count": null,
        "metadata": {},
        "outputs": [],
        "source": source_lines(text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{RecoveryPolicy, StepPurpose};
    use crate::fetch::RepositoryReference;
    use chrono::Utc;

    fn step(index: usize, label: &str, purpose: StepPurpose, fatal: bool) -> DeploymentStep {
        DeploymentStep {
            index,
            label: label.to_string(),
            purpose,
            banner: format!("banner for {}", label),
            script: format!("set -euo pipefail\necho {}\n", label),
            recovery: if fatal {
                RecoveryPolicy::fatal(1)
            } else {
                RecoveryPolicy::best_effort(0)
            },
        }
    }

    fn artifact() -> DeploymentArtifact {
        DeploymentArtifact {
            id: "nbd-0011223344556677".to_string(),
            created_at: Utc::now(),
            repository: RepositoryReference::parse("https://github.com/octo/api").unwrap(),
            commit: Some("abc123".to_string()),
            entrypoint: None,
            dependency_plan: Default::default(),
            secret_keys: vec![],
            server_port: 8000,
            steps: vec![
                step(1, "01-fetch", StepPurpose::Fetch, true),
                step(2, "02-report-url", StepPurpose::ReportUrl, false),
            ],
        }
    }

    #[test]
    fn test_notebook_shape() {
        let nb = to_notebook(&artifact());
        assert_eq!(nb["nbformat"], 4);
        assert_eq!(nb["metadata"]["kernelspec"]["name"], "python3");

        let cells = nb["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 1 + 2 * 2);
        assert_eq!(cells[0]["cell_type"], "markdown");
        assert_eq!(cells[1]["cell_type"], "markdown");
        assert_eq!(cells[2]["cell_type"], "code");
        assert_eq!(cells[2]["source"][0], "%%bash\n");
        assert_eq!(cells[2]["source"][2], "echo 01-fetch\n");
        assert!(cells[0]["source"][0]
            .as_str()
            .unwrap()
            .starts_with("# Deploy https://github.com/octo/api"));
    }

    #[test]
    fn test_notebook_banner_mentions_recovery() {
        let nb = to_notebook(&artifact());
        let banner: String = nb["cells"][1]["source"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(banner.contains("Step 1: `01-fetch`"));
        assert!(banner.contains("Failure stops the deployment. Retried up to 1 time(s)."));
    }

    #[test]
    fn test_shell_script_runs_steps_in_order() {
        let script = to_shell_script(&artifact());
        assert!(script.starts_with("#!/usr/bin/env bash\n"));

        let first = script.find("bash <<'NBDEPLOY_STEP_01'").unwrap();
        let second = script.find("bash <<'NBDEPLOY_STEP_02'").unwrap();
        assert!(first < second);
        assert!(script.contains("01-fetch failed, stopping"));
        assert!(script.contains("02-report-url failed, continuing"));
    }

    #[test]
    fn test_json_round_trip() {
        let original = artifact();
        let text = to_json(&original).unwrap();
        let parsed: DeploymentArtifact = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }
}
