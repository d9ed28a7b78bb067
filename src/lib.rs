//! nbdeploy - deployment planning for Python web backends in notebook sessions
//!
//! Given a public repository, a dependency manifest and an optional env file,
//! nbdeploy produces a [`DeploymentArtifact`]: an ordered list of standalone
//! bash steps that a remote notebook session runs to fetch the code, inject
//! secrets, install dependencies, open a tunnel, start the server and report
//! the public URL. Alongside it comes a [`DeploymentStatus`] explaining every
//! decision taken on the way.
//!
//! # Example Usage
//!
//! ```no_run
//! use nbdeploy::{DeploymentPlanner, DeploymentRequest, PlannerConfig};
//!
//! # async fn run() {
//! let planner = DeploymentPlanner::new(PlannerConfig::default());
//! let request = DeploymentRequest::new("https://github.com/octo/api", "fastapi\nuvicorn\n")
//!     .with_env("API_KEY=abc\n");
//!
//! let (artifact, status) = planner.plan_deployment(&request).await;
//! println!("{}", status.outcome);
//! if let Some(artifact) = artifact {
//!     let notebook = nbdeploy::artifact::render::to_notebook(&artifact);
//!     println!("{}", notebook);
//! }
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`fetch`]: repository references and scoped working trees
//! - [`detection`]: static entry point detection
//! - [`manifest`]: dependency plans
//! - [`secrets`]: env-file parsing
//! - [`artifact`]: step composition and rendering
//! - [`status`]: status aggregation and execution signal ingestion
//! - [`planner`]: the end-to-end pipeline

pub mod artifact;
pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod fetch;
pub mod fs;
pub mod manifest;
pub mod planner;
pub mod secrets;
pub mod status;
pub mod util;

pub use artifact::{ArtifactComposer, DeploymentArtifact, DeploymentStep, RecoveryPolicy, StepPurpose};
pub use config::PlannerConfig;
pub use detection::{EntryPointCandidate, EntryPointDetector, FrameworkKind};
pub use error::{ConfigError, DeploymentIssue, FetchError, FetchErrorReason};
pub use fetch::{GitFetcher, RepositoryFetcher, RepositoryReference, StaticFetcher};
pub use manifest::{DependencyEntry, DependencyPlan, DependencyPlanner, FatalPolicy};
pub use planner::{DeploymentPlanner, DeploymentRequest};
pub use secrets::{SecretSet, SecretsInjector};
pub use status::{DeploymentStatus, ExecutionReport, Outcome, StatusReporter};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
