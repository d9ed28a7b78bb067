//! Configuration management for nbdeploy
//!
//! Everything the planner needs beyond the request itself lives in
//! [`PlannerConfig`], an explicit value handed to [`crate::DeploymentPlanner`].
//! `Default` loads it from environment variables, falling back to the defaults
//! below for anything unset or unparsable.
//!
//! # Environment Variables
//!
//! - `NBDEPLOY_TEMP_ROOT`: scratch directory root - default: system temp dir
//! - `NBDEPLOY_FETCH_TIMEOUT`: fetch timeout in seconds - default: "60"
//! - `NBDEPLOY_VERIFY_VISIBILITY`: ask the GitHub API before cloning - default: "true"
//! - `NBDEPLOY_GITHUB_API`: GitHub REST API base - default: "https://api.github.com"
//! - `NBDEPLOY_TUNNEL_TOKEN`: tunnel provider auth token - default: unset
//! - `NBDEPLOY_SERVER_PORT`: port the remote server binds - default: "8000"
//! - `NBDEPLOY_MIN_CONFIDENCE`: lowest entry point score that is started - default: "50"
//! - `NBDEPLOY_FATAL_PACKAGES`: comma separated packages whose install failure is fatal
//! - `NBDEPLOY_FATAL_REQUIRES_PIN`: only pinned fatal packages are fatal - default: "false"
//! - `NBDEPLOY_REMOTE_WORKDIR`: checkout location in the remote session - default: "/content/app"
//! - `NBDEPLOY_REMOTE_STATE_DIR`: markers, pid files and secrets - default: "/content/.nbdeploy"
//! - `NBDEPLOY_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use nbdeploy::PlannerConfig;
//!
//! let mut config = PlannerConfig::default();
//! config.server_port = 9000;
//! config.validate().expect("Invalid configuration");
//! ```

use crate::error::ConfigError;
use crate::manifest::FatalPolicy;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_GITHUB_API: &str = "https://api.github.com";
const DEFAULT_SERVER_PORT: u16 = 8000;
const DEFAULT_MIN_CONFIDENCE: u32 = 50;
const DEFAULT_REMOTE_WORKDIR: &str = "/content/app";
const DEFAULT_REMOTE_STATE_DIR: &str = "/content/.nbdeploy";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Planner configuration
#[derive(Clone)]
pub struct PlannerConfig {
    /// Root under which per-request scratch directories are created
    pub temp_root: PathBuf,

    /// Upper bound on the whole fetch (API check plus clone)
    pub fetch_timeout_secs: u64,

    /// Query the GitHub API for visibility before cloning
    pub verify_visibility: bool,

    pub github_api_base: String,

    /// Tunnel provider token, carried into the artifact encoded, never printed
    pub tunnel_token: Option<String>,

    pub server_port: u16,

    /// Candidates scoring below this are not started
    pub min_confidence: u32,

    pub fatal_policy: FatalPolicy,

    /// Where the remote session checks out the repository
    pub remote_workdir: String,

    /// Where the remote session keeps markers, pid files and `secrets.env`
    pub remote_state_dir: String,

    pub log_level: String,
}

impl Default for PlannerConfig {
    /// Loads NBDEPLOY_* environment variables, falling back to defaults
    fn default() -> Self {
        let temp_root = env::var("NBDEPLOY_TEMP_ROOT")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let fetch_timeout_secs = env::var("NBDEPLOY_FETCH_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);

        let verify_visibility = env::var("NBDEPLOY_VERIFY_VISIBILITY")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let github_api_base = env::var("NBDEPLOY_GITHUB_API")
            .unwrap_or_else(|_| DEFAULT_GITHUB_API.to_string())
            .trim_end_matches('/')
            .to_string();

        let tunnel_token = env::var("NBDEPLOY_TUNNEL_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let server_port = env::var("NBDEPLOY_SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);

        let min_confidence = env::var("NBDEPLOY_MIN_CONFIDENCE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MIN_CONFIDENCE);

        let mut fatal_policy = env::var("NBDEPLOY_FATAL_PACKAGES")
            .ok()
            .map(|v| FatalPolicy::from_list(&v))
            .unwrap_or_default();
        if let Some(require_pin) = env::var("NBDEPLOY_FATAL_REQUIRES_PIN")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
        {
            fatal_policy.require_pin = require_pin;
        }

        let remote_workdir = env::var("NBDEPLOY_REMOTE_WORKDIR")
            .unwrap_or_else(|_| DEFAULT_REMOTE_WORKDIR.to_string());

        let remote_state_dir = env::var("NBDEPLOY_REMOTE_STATE_DIR")
            .unwrap_or_else(|_| DEFAULT_REMOTE_STATE_DIR.to_string());

        let log_level = env::var("NBDEPLOY_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            temp_root,
            fetch_timeout_secs,
            verify_visibility,
            github_api_base,
            tunnel_token,
            server_port,
            min_confidence,
            fatal_policy,
            remote_workdir,
            remote_state_dir,
            log_level,
        }
    }
}

impl PlannerConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Fetch timeout must be at least 1 second".to_string(),
            ));
        }
        if self.fetch_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Fetch timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.server_port == 0 {
            return Err(ConfigError::ValidationFailed(
                "Server port must be non-zero".to_string(),
            ));
        }

        if self.min_confidence > 100 {
            return Err(ConfigError::ValidationFailed(format!(
                "Minimum confidence must be between 0 and 100, got {}",
                self.min_confidence
            )));
        }

        for (name, value) in [
            ("remote workdir", &self.remote_workdir),
            ("remote state dir", &self.remote_state_dir),
        ] {
            if !value.starts_with('/') {
                return Err(ConfigError::ValidationFailed(format!(
                    "The {} must be an absolute path, got '{}'",
                    name, value
                )));
            }
            if value.contains('\'') {
                return Err(ConfigError::ValidationFailed(format!(
                    "The {} must not contain single quotes",
                    name
                )));
            }
        }

        if !self.github_api_base.starts_with("http://")
            && !self.github_api_base.starts_with("https://")
        {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid GitHub API base: {}",
                self.github_api_base
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Reads the tunnel token from an arbitrary environment variable
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` when the variable is unset or empty
    pub fn tunnel_token_from_env(&mut self, var: &str) -> Result<(), ConfigError> {
        let value = env::var(var).map_err(|e| ConfigError::ParseError {
            field: var.to_string(),
            error: e.to_string(),
        })?;
        if value.trim().is_empty() {
            return Err(ConfigError::ParseError {
                field: var.to_string(),
                error: "empty value".to_string(),
            });
        }
        self.tunnel_token = Some(value.trim().to_string());
        Ok(())
    }
}

impl fmt::Debug for PlannerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannerConfig")
            .field("temp_root", &self.temp_root)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("verify_visibility", &self.verify_visibility)
            .field("github_api_base", &self.github_api_base)
            .field("tunnel_token", &self.tunnel_token.as_ref().map(|_| "***"))
            .field("server_port", &self.server_port)
            .field("min_confidence", &self.min_confidence)
            .field("fatal_policy", &self.fatal_policy)
            .field("remote_workdir", &self.remote_workdir)
            .field("remote_state_dir", &self.remote_state_dir)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl fmt::Display for PlannerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nbdeploy Configuration:")?;
        writeln!(f, "  Temp Root: {}", self.temp_root.display())?;
        writeln!(f, "  Fetch Timeout: {}s", self.fetch_timeout_secs)?;
        writeln!(f, "  Verify Visibility: {}", self.verify_visibility)?;
        writeln!(f, "  GitHub API: {}", self.github_api_base)?;
        writeln!(
            f,
            "  Tunnel Token: {}",
            if self.tunnel_token.is_some() {
                "***"
            } else {
                "(none)"
            }
        )?;
        writeln!(f, "  Server Port: {}", self.server_port)?;
        writeln!(f, "  Min Confidence: {}", self.min_confidence)?;
        writeln!(
            f,
            "  Fatal Packages: {}{}",
            self.fatal_policy.packages.join(", "),
            if self.fatal_policy.require_pin {
                " (pinned only)"
            } else {
                ""
            }
        )?;
        writeln!(f, "  Remote Workdir: {}", self.remote_workdir)?;
        writeln!(f, "  Remote State Dir: {}", self.remote_state_dir)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
