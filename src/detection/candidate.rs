use super::framework::{FrameworkKind, LaunchSpec};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

/// A place where a web application object is declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointCandidate {
    /// Path relative to the repository root
    pub file_path: PathBuf,
    pub framework_kind: FrameworkKind,
    pub application_symbol: String,
    /// Relative ranking signal between 0 and 100, not a probability
    pub confidence_score: u32,
    /// 1-based line of the declaration
    pub line: usize,
}

impl EntryPointCandidate {
    pub fn new(
        file_path: PathBuf,
        framework_kind: FrameworkKind,
        application_symbol: String,
        confidence_score: u32,
        line: usize,
    ) -> Self {
        Self {
            file_path,
            framework_kind,
            application_symbol,
            confidence_score,
            line,
        }
    }

    pub fn depth(&self) -> usize {
        self.file_path.components().count()
    }

    /// Where to run from and which module to import.
    ///
    /// When every path component is a Python identifier the module is the
    /// dotted path from the root. Otherwise the server runs from the file's
    /// own directory. `None` when not even the file stem is importable.
    pub fn import_location(&self) -> Option<(String, String)> {
        let parts: Vec<String> = self
            .file_path
            .with_extension("")
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();

        let mut module_parts = parts.clone();
        if module_parts.len() > 1 && module_parts.last().map(String::as_str) == Some("__init__") {
            module_parts.pop();
        }

        if module_parts.iter().all(|p| identifier_regex().is_match(p)) {
            return Some((".".to_string(), module_parts.join(".")));
        }

        let stem = parts.last()?;
        if !identifier_regex().is_match(stem) {
            return None;
        }
        let parent = self
            .file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(path_to_slash)
            .unwrap_or_else(|| ".".to_string());
        Some((parent, stem.clone()))
    }

    /// `module:symbol` as understood by uvicorn and flask
    pub fn target(&self) -> Option<String> {
        self.import_location()
            .map(|(_, module)| format!("{}:{}", module, self.application_symbol))
    }

    /// Launch instructions; `None` for unrecognised frameworks
    pub fn launch(&self, port: u16) -> Option<LaunchSpec> {
        let signature = self.framework_kind.signature()?;
        let (working_dir, module) = self.import_location()?;
        let target = format!("{}:{}", module, self.application_symbol);
        Some(LaunchSpec {
            working_dir,
            command: signature.launch_command(&target, port),
            runner_package: signature.runner_package().to_string(),
        })
    }

    pub fn doc_paths(&self) -> &'static [&'static str] {
        self.framework_kind
            .signature()
            .map(|s| s.doc_paths())
            .unwrap_or(&[])
    }
}

impl fmt::Display for EntryPointCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({}, line {}, confidence {})",
            path_to_slash(&self.file_path),
            self.application_symbol,
            self.framework_kind,
            self.line,
            self.confidence_score
        )
    }
}

pub(crate) fn path_to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(path: &str, kind: FrameworkKind) -> EntryPointCandidate {
        EntryPointCandidate::new(PathBuf::from(path), kind, "app".to_string(), 100, 3)
    }

    #[test]
    fn test_root_module() {
        let c = candidate("main.py", FrameworkKind::FastApi);
        assert_eq!(c.target().as_deref(), Some("main:app"));

        let launch = c.launch(8000).unwrap();
        assert_eq!(launch.working_dir, ".");
        assert_eq!(
            launch.command,
            "python -m uvicorn 'main:app' --host 0.0.0.0 --port 8000"
        );
        assert_eq!(launch.runner_package, "uvicorn");
    }

    #[test]
    fn test_nested_module() {
        let c = candidate("src/api/server.py", FrameworkKind::Flask);
        assert_eq!(c.target().as_deref(), Some("src.api.server:app"));
        assert_eq!(c.depth(), 3);
        assert_eq!(
            c.launch(8000).unwrap().command,
            "python -m flask --app 'src.api.server:app' run --host 0.0.0.0 --port 8000"
        );
    }

    #[test]
    fn test_package_init() {
        let c = candidate("service/__init__.py", FrameworkKind::Flask);
        assert_eq!(c.target().as_deref(), Some("service:app"));
    }

    #[test]
    fn test_non_identifier_directory_runs_from_parent() {
        let c = candidate("my-service/main.py", FrameworkKind::FastApi);
        let launch = c.launch(9000).unwrap();
        assert_eq!(launch.working_dir, "my-service");
        assert!(launch.command.contains("'main:app'"));
    }

    #[test]
    fn test_unimportable_file() {
        let c = candidate("my-app.py", FrameworkKind::FastApi);
        assert!(c.target().is_none());
        assert!(c.launch(8000).is_none());
    }

    #[test]
    fn test_unknown_has_no_launch() {
        let c = candidate("app.py", FrameworkKind::Unknown);
        assert_eq!(c.target().as_deref(), Some("app:app"));
        assert!(c.launch(8000).is_none());
        assert!(c.doc_paths().is_empty());
    }

    #[test]
    fn test_display() {
        let c = candidate("main.py", FrameworkKind::FastApi);
        assert_eq!(c.to_string(), "main.py:app (FASTAPI, line 3, confidence 100)");
        assert_eq!(c.doc_paths(), &["/docs", "/redoc"]);
    }
}
