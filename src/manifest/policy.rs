use super::requirement::{normalize_name, Requirement};
use serde::{Deserialize, Serialize};

const DEFAULT_FATAL_PACKAGES: &[&str] = &[
    "fastapi",
    "flask",
    "uvicorn",
    "gunicorn",
    "starlette",
    "werkzeug",
];

/// Decides which failed installs abort the deployment.
///
/// A package is fatal when its normalised name is listed in `packages` and,
/// if `require_pin` is set, the manifest pins it with `==`. Everything else is
/// installed best-effort.
///
/// The default policy does not require a pin: a framework or server package
/// is fatal however the manifest names it, since the application cannot start
/// without it. Set `require_pin` (`NBDEPLOY_FATAL_REQUIRES_PIN=true`) to only
/// treat pinned entries as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatalPolicy {
    pub packages: Vec<String>,
    pub require_pin: bool,
}

impl Default for FatalPolicy {
    fn default() -> Self {
        Self {
            packages: DEFAULT_FATAL_PACKAGES.iter().map(|s| s.to_string()).collect(),
            require_pin: false,
        }
    }
}

impl FatalPolicy {
    /// Builds a policy from a comma or whitespace separated package list
    pub fn from_list(list: &str) -> Self {
        let mut packages: Vec<String> = Vec::new();
        for name in list
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
        {
            let key = normalize_name(name);
            if !packages.contains(&key) {
                packages.push(key);
            }
        }
        Self {
            packages,
            require_pin: false,
        }
    }

    pub fn is_fatal(&self, requirement: &Requirement) -> bool {
        let listed = self.packages.iter().any(|p| *p == requirement.key);
        listed && (!self.require_pin || requirement.is_pinned())
    }
}
