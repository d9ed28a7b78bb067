//! FastAPI application detection

use super::*;
use std::sync::OnceLock;

pub struct FastApiSignature;

impl FrameworkSignature for FastApiSignature {
    fn kind(&self) -> FrameworkKind {
        FrameworkKind::FastApi
    }

    fn import_pattern(&self) -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| import_regex("fastapi"))
    }

    fn declaration_pattern(&self) -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| declaration_regex("fastapi", "FastAPI"))
    }

    fn launch_command(&self, target: &str, port: u16) -> String {
        format!(
            "python -m uvicorn '{}' --host 0.0.0.0 --port {}",
            target, port
        )
    }

    fn runner_package(&self) -> &'static str {
        "uvicorn"
    }

    fn doc_paths(&self) -> &'static [&'static str] {
        &["/docs", "/redoc"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fastapi_declaration() {
        let signature = FastApiSignature;

        assert_eq!(signature.declared_symbol("app = FastAPI()"), Some("app".to_string()));
        assert_eq!(
            signature.declared_symbol("api = FastAPI(title=\"Demo\", version=\"1.0\")"),
            Some("api".to_string())
        );
        assert_eq!(signature.declared_symbol("app = Flask(__name__)"), None);
        assert_eq!(signature.declared_symbol("router = APIRouter()"), None);
    }

    #[test]
    fn test_fastapi_import() {
        let signature = FastApiSignature;

        assert!(signature.imports_framework("from fastapi import FastAPI, Depends"));
        assert!(signature.imports_framework("import fastapi"));
        assert!(!signature.imports_framework("from flask import Flask"));
    }

    #[test]
    fn test_fastapi_launch() {
        let signature = FastApiSignature;

        assert_eq!(
            signature.launch_command("main:app", 8000),
            "python -m uvicorn 'main:app' --host 0.0.0.0 --port 8000"
        );
        assert_eq!(signature.runner_package(), "uvicorn");
        assert!(signature.doc_paths().contains(&"/docs"));
    }
}
