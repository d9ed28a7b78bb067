//! Supported web frameworks
//!
//! Each framework family is a variant of the closed [`FrameworkKind`] enum and
//! owns a [`FrameworkSignature`]: the textual patterns that recognise its
//! import and application-object declaration, and the command that serves it.
//! Matching is purely textual; scanned files are never imported or executed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod fastapi;
pub mod flask;

/// Framework family of an entry point candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FrameworkKind {
    #[serde(rename = "FASTAPI")]
    FastApi,
    #[serde(rename = "FLASK")]
    Flask,
    /// An `app = something(...)` assignment whose callable is not recognised
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl FrameworkKind {
    /// Framework families with a signature, in matching order
    pub const RECOGNIZED: [FrameworkKind; 2] = [FrameworkKind::FastApi, FrameworkKind::Flask];

    pub fn signature(&self) -> Option<&'static dyn FrameworkSignature> {
        match self {
            FrameworkKind::FastApi => Some(&fastapi::FastApiSignature),
            FrameworkKind::Flask => Some(&flask::FlaskSignature),
            FrameworkKind::Unknown => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.signature().is_some()
    }
}

impl fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameworkKind::FastApi => "FASTAPI",
            FrameworkKind::Flask => "FLASK",
            FrameworkKind::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// How to start a detected application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Directory to run from, relative to the checkout (`.` for the root)
    pub working_dir: String,
    /// Shell command line, arguments already quoted
    pub command: String,
    /// Package the command needs, installed when missing
    pub runner_package: String,
}

/// Textual signature of one framework family
pub trait FrameworkSignature: Send + Sync {
    fn kind(&self) -> FrameworkKind;

    /// Matches `from <pkg> import ...` / `import <pkg>` anywhere in the file
    fn import_pattern(&self) -> &'static Regex;

    /// Matches a top-level `<symbol> = <Framework>(` assignment; group 1 is the symbol
    fn declaration_pattern(&self) -> &'static Regex;

    /// Command line serving `<module>:<symbol>` on all interfaces
    fn launch_command(&self, target: &str, port: u16) -> String;

    /// Package providing the launcher
    fn runner_package(&self) -> &'static str;

    /// Paths worth printing next to the public URL
    fn doc_paths(&self) -> &'static [&'static str] {
        &[]
    }

    fn imports_framework(&self, line: &str) -> bool {
        self.import_pattern().is_match(line)
    }

    fn declared_symbol(&self, line: &str) -> Option<String> {
        self.declaration_pattern()
            .captures(line)
            .map(|caps| caps[1].to_string())
    }
}

/// Builds `^<symbol> [: annotation] = [<module>.]<Class>(` for a framework class
pub(crate) fn declaration_regex(module: &str, class: &str) -> Regex {
    Regex::new(&format!(
        r"^([A-Za-z_]\w*)\s*(?::\s*[A-Za-z_][\w.]*\s*)?=\s*(?:{}\.)?{}\s*\(",
        regex::escape(module),
        regex::escape(class)
    ))
    .expect("valid regex")
}

/// Builds the import matcher for a top-level package
pub(crate) fn import_regex(module: &str) -> Regex {
    let module = regex::escape(module);
    Regex::new(&format!(
        r"^\s*(?:from\s+{m}(?:\.\w+)*\s+import\b|import\s+(?:[\w.]+\s*,\s*)*{m}\b)",
        m = module
    ))
    .expect("valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signatures() {
        for kind in FrameworkKind::RECOGNIZED {
            let signature = kind.signature().unwrap();
            assert_eq!(signature.kind(), kind);
            assert!(kind.is_recognized());
        }
        assert!(FrameworkKind::Unknown.signature().is_none());
    }

    #[test]
    fn test_serialization_names() {
        assert_eq!(
            serde_json::to_string(&FrameworkKind::FastApi).unwrap(),
            "\"FASTAPI\""
        );
        assert_eq!(FrameworkKind::Flask.to_string(), "FLASK");
        assert_eq!(FrameworkKind::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_declaration_regex_shapes() {
        let re = declaration_regex("fastapi", "FastAPI");
        assert!(re.is_match("app = FastAPI()"));
        assert!(re.is_match("api: FastAPI = FastAPI(title='x')"));
        assert!(re.is_match("app=fastapi.FastAPI("));
        assert!(!re.is_match("    app = FastAPI()"));
        assert!(!re.is_match("app == FastAPI()"));
        assert!(!re.is_match("app = FastAPIRouter()"));
    }

    #[test]
    fn test_import_regex_shapes() {
        let re = import_regex("flask");
        assert!(re.is_match("from flask import Flask"));
        assert!(re.is_match("from flask.views import MethodView"));
        assert!(re.is_match("import flask"));
        assert!(re.is_match("import os, flask"));
        assert!(!re.is_match("import flask_cors"));
        assert!(!re.is_match("from flask_sqlalchemy import SQLAlchemy"));
    }
}
