pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, DetectArgs, PlanArgs, ReportArgs};
pub use output::{OutputFormat, OutputFormatter};
