//! Subcommand handlers. Each returns the process exit code.

use super::commands::{DetectArgs, PlanArgs, ReportArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::artifact::{render, DeploymentArtifact};
use crate::config::PlannerConfig;
use crate::detection::EntryPointDetector;
use crate::fs::RealFileSystem;
use crate::planner::{DeploymentPlanner, DeploymentRequest};
use crate::status::{DeploymentStatus, ExecutionReport, StatusReporter};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub async fn handle_plan(args: &PlanArgs, quiet: bool) -> i32 {
    match run_plan(args, quiet).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

async fn run_plan(args: &PlanArgs, quiet: bool) -> Result<i32> {
    let config = planner_config(args)?;
    debug!(config = ?config, "Planner configuration");

    let manifest = fs::read(&args.manifest)
        .with_context(|| format!("Failed to read manifest {}", args.manifest.display()))?;
    let mut request = DeploymentRequest::new(args.repo.clone(), manifest);
    if let Some(env_file) = &args.env_file {
        let env = fs::read(env_file)
            .with_context(|| format!("Failed to read env file {}", env_file.display()))?;
        request = request.with_env(env);
    }

    let planner = DeploymentPlanner::new(config);
    let (artifact, status) = planner.plan_deployment(&request).await;

    let written = match (&args.output_dir, &artifact) {
        (Some(dir), Some(artifact)) => write_outputs(dir, artifact, &status)?,
        (Some(dir), None) => vec![write_status(dir, &status)?],
        _ => Vec::new(),
    };

    if !quiet || !status.is_ready() {
        let formatter = OutputFormatter::new(OutputFormat::from(args.format));
        println!("{}", formatter.format_plan(&status, artifact.as_ref(), &written)?);
    }

    Ok(status.exit_code())
}

fn planner_config(args: &PlanArgs) -> Result<PlannerConfig> {
    let mut config = PlannerConfig::default();
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(min_confidence) = args.min_confidence {
        config.min_confidence = min_confidence;
    }
    if let Some(timeout) = args.timeout {
        config.fetch_timeout_secs = timeout;
    }
    if args.no_visibility_check {
        config.verify_visibility = false;
    }
    if let Some(var) = &args.tunnel_token_env {
        config
            .tunnel_token_from_env(var)
            .context("Failed to read tunnel token")?;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Writes the notebook, shell script, artifact and status into `dir`
pub fn write_outputs(
    dir: &Path,
    artifact: &DeploymentArtifact,
    status: &DeploymentStatus,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let stem = artifact.file_stem();
    let notebook = serde_json::to_string_pretty(&render::to_notebook(artifact))
        .context("Failed to serialize notebook")?;

    let files = [
        (dir.join(format!("{}.ipynb", stem)), notebook),
        (dir.join(format!("{}.sh", stem)), render::to_shell_script(artifact)),
        (dir.join("artifact.json"), render::to_json(artifact)?),
    ];

    let mut written = Vec::new();
    for (path, content) in files {
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote artifact file");
        written.push(path);
    }
    written.push(write_status(dir, status)?);
    Ok(written)
}

fn write_status(dir: &Path, status: &DeploymentStatus) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join("status.json");
    let text = serde_json::to_string_pretty(status).context("Failed to serialize status")?;
    fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn handle_detect(args: &DetectArgs) -> i32 {
    match run_detect(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn run_detect(args: &DetectArgs) -> Result<i32> {
    let path = args
        .repository_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let root = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let candidates = EntryPointDetector::new().detect(&RealFileSystem, &root);
    info!(candidates = candidates.len(), root = %root.display(), "Detection finished");

    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    println!("{}", formatter.format_candidates(&root, &candidates)?);

    Ok(if candidates.is_empty() { 2 } else { 0 })
}

pub fn handle_report(args: &ReportArgs) -> i32 {
    match run_report(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn run_report(args: &ReportArgs) -> Result<i32> {
    let log = fs::read(&args.log)
        .with_context(|| format!("Failed to read log {}", args.log.display()))?;
    let report = ExecutionReport::parse(&String::from_utf8_lossy(&log));

    let artifact: Option<DeploymentArtifact> = match &args.artifact {
        Some(path) => Some(read_json(path)?),
        None => None,
    };
    let mut status: DeploymentStatus = match &args.status {
        Some(path) => read_json(path)?,
        None => StatusReporter::new().finish(artifact.as_ref().and_then(|a| a.entrypoint.clone())),
    };

    StatusReporter::ingest_execution(&mut status, artifact.as_ref(), &report);

    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    println!("{}", formatter.format_report(&status)?);

    let failed = report.failed().count() > 0;
    Ok(if status.artifact_valid && !failed { 0 } else { 1 })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
