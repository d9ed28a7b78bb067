//! Entry point detection
//!
//! Finds the web application object of a Python project by reading its
//! source as text. Nothing from the scanned tree is ever imported or run.

mod candidate;
mod detector;
pub mod framework;
pub mod source;

pub use candidate::EntryPointCandidate;
pub(crate) use candidate::path_to_slash;
pub use detector::{conventional_rank, EntryPointDetector, CONVENTIONAL_NAMES, MAX_CONFIDENCE};
pub use framework::{FrameworkKind, FrameworkSignature, LaunchSpec};
