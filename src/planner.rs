//! Deployment planning
//!
//! [`DeploymentPlanner::plan_deployment`] runs the stages strictly in order:
//! fetch, detect, plan dependencies, parse secrets, compose. Every failure
//! is folded into the returned [`DeploymentStatus`]; a fetch failure or an
//! empty manifest means no artifact, an unresolved entry point means an
//! artifact without a start-server step.

use crate::artifact::{ArtifactComposer, ComposeInput, DeploymentArtifact};
use crate::config::PlannerConfig;
use crate::detection::EntryPointDetector;
use crate::error::DeploymentIssue;
use crate::fetch::{GitFetcher, RepositoryFetcher, SourceFetcher};
use crate::fs::RealFileSystem;
use crate::manifest::DependencyPlanner;
use crate::secrets::{SecretEvent, SecretsInjector};
use crate::status::{DeploymentStatus, StatusReporter};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Candidates listed individually in the status before the rest are summarised
const LISTED_CANDIDATES: usize = 5;

/// One deployment request, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub repository_reference: String,
    pub env_payload: Option<Vec<u8>>,
    pub manifest_payload: Vec<u8>,
}

impl DeploymentRequest {
    pub fn new(repository_reference: impl Into<String>, manifest_payload: impl Into<Vec<u8>>) -> Self {
        Self {
            repository_reference: repository_reference.into(),
            env_payload: None,
            manifest_payload: manifest_payload.into(),
        }
    }

    pub fn with_env(mut self, env_payload: impl Into<Vec<u8>>) -> Self {
        self.env_payload = Some(env_payload.into());
        self
    }
}

pub struct DeploymentPlanner {
    source: SourceFetcher,
    detector: EntryPointDetector,
    dependencies: DependencyPlanner,
    secrets: SecretsInjector,
    composer: ArtifactComposer,
}

impl DeploymentPlanner {
    /// Planner that clones from GitHub
    pub fn new(config: PlannerConfig) -> Self {
        let fetcher = GitFetcher::new(config.github_api_base.clone(), config.verify_visibility);
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    pub fn with_fetcher(config: PlannerConfig, fetcher: Arc<dyn RepositoryFetcher>) -> Self {
        Self {
            source: SourceFetcher::new(fetcher, config.temp_root.clone(), config.fetch_timeout()),
            detector: EntryPointDetector::new(),
            dependencies: DependencyPlanner::new(config.fatal_policy.clone()),
            secrets: SecretsInjector::new(),
            composer: ArtifactComposer::new(&config),
        }
    }

    pub async fn plan_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> (Option<DeploymentArtifact>, DeploymentStatus) {
        let mut reporter = StatusReporter::new();
        info!(repo = %request.repository_reference, "Planning deployment");

        let tree = match self.source.fetch(&request.repository_reference).await {
            Ok(tree) => tree,
            Err(e) => {
                warn!(repo = %request.repository_reference, error = %e, "Fetch failed");
                reporter.issue(DeploymentIssue::Fetch(e));
                return (None, reporter.finish(None));
            }
        };
        reporter.note(match &tree.info().commit {
            Some(commit) => format!(
                "fetched {} at {}",
                tree.reference().slug(),
                &commit[..commit.len().min(12)]
            ),
            None => format!("fetched {}", tree.reference().slug()),
        });

        let candidates = self.detector.detect(&RealFileSystem, tree.root());
        debug!(candidates = candidates.len(), "Detection finished");
        if !candidates.is_empty() {
            reporter.note(format!(
                "detector found {} candidate(s)",
                candidates.len()
            ));
        }
        for candidate in candidates.iter().take(LISTED_CANDIDATES) {
            reporter.note(format!("candidate {}", candidate));
        }
        if candidates.len() > LISTED_CANDIDATES {
            reporter.note(format!(
                "{} lower-ranked candidate(s) not listed",
                candidates.len() - LISTED_CANDIDATES
            ));
        }

        let chosen = match self.composer.resolve_entrypoint(&candidates) {
            Ok(candidate) => {
                reporter.note(format!("entry point {}", candidate));
                Some(candidate.clone())
            }
            Err(issue) => {
                if let Some(top) = candidates.first() {
                    if top.target().is_none() || !top.framework_kind.is_recognized() {
                        reporter.note(format!(
                            "{} cannot be started: framework not recognized or module not importable",
                            top
                        ));
                    }
                }
                reporter.issue(issue);
                None
            }
        };

        let manifest = self.dependencies.plan(&request.manifest_payload);
        for note in manifest.notes {
            reporter.note(note);
        }
        if manifest.plan.is_empty() {
            reporter.issue(DeploymentIssue::ManifestEmpty);
            return (None, reporter.finish(chosen));
        }
        reporter.note(format!(
            "dependency plan: {} entr{} ({})",
            manifest.plan.len(),
            if manifest.plan.len() == 1 { "y" } else { "ies" },
            manifest.plan.names().join(", ")
        ));

        let secrets = self.secrets.parse(request.env_payload.as_deref());
        for event in secrets.events.iter().cloned() {
            match event {
                SecretEvent::Dropped(issue) => reporter.issue(issue),
                other => reporter.note(other.to_string()),
            }
        }
        reporter.note(secrets.summary());

        let (reference, info) = tree.provenance();
        let artifact = self.composer.compose(ComposeInput {
            reference: &reference,
            info: &info,
            entrypoint: chosen.as_ref(),
            plan: &manifest.plan,
            secrets: &secrets.secrets,
        });
        reporter.note(format!(
            "artifact {} with {} step(s)",
            artifact.id,
            artifact.steps.len()
        ));

        // the scratch copy is no longer needed once composition has read it
        drop(tree);

        let status = reporter.finish(chosen);
        info!(outcome = %status.outcome, artifact = %artifact.id, "Planning finished");
        (Some(artifact), status)
    }
}
