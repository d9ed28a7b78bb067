//! Dependency manifest handling
//!
//! A manifest is a requirements-style list, one specification per line. The
//! [`DependencyPlanner`] turns it into an ordered [`DependencyPlan`] with one
//! entry per normalised package name. A repeated name overrides the earlier
//! spec but keeps the earlier position. Each entry is flagged fatal or optional
//! according to a [`FatalPolicy`].

mod plan;
mod policy;
mod requirement;

pub use plan::{DependencyEntry, DependencyPlan, DependencyPlanner, ManifestOutcome};
pub use policy::FatalPolicy;
pub use requirement::{normalize_name, Constraint, Requirement};
