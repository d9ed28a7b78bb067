//! Flask application detection

use super::*;
use std::sync::OnceLock;

pub struct FlaskSignature;

impl FrameworkSignature for FlaskSignature {
    fn kind(&self) -> FrameworkKind {
        FrameworkKind::Flask
    }

    fn import_pattern(&self) -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| import_regex("flask"))
    }

    fn declaration_pattern(&self) -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| declaration_regex("flask", "Flask"))
    }

    fn launch_command(&self, target: &str, port: u16) -> String {
        format!(
            "python -m flask --app '{}' run --host 0.0.0.0 --port {}",
            target, port
        )
    }

    fn runner_package(&self) -> &'static str {
        "flask"
    }
}
