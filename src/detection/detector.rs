use super::candidate::EntryPointCandidate;
use super::framework::FrameworkKind;
use super::source::code_lines;
use crate::fs::FileSystem;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// File names that conventionally hold the application, highest precedence first
pub const CONVENTIONAL_NAMES: &[&str] = &[
    "main.py", "app.py", "server.py", "api.py", "run.py", "wsgi.py", "asgi.py",
];

const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "venv",
    ".venv",
    "env",
    "__pycache__",
    "node_modules",
    "site-packages",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "build",
    "dist",
];

const ROOT_CONVENTIONAL_BONUS: u32 = 50;
const NESTED_CONVENTIONAL_BONUS: u32 = 30;
const SINGLE_OBJECT_BONUS: u32 = 40;
const MULTIPLE_OBJECT_BONUS: u32 = 10;
const IMPORT_BONUS: u32 = 10;

/// Highest score a candidate can reach
pub const MAX_CONFIDENCE: u32 = ROOT_CONVENTIONAL_BONUS + SINGLE_OBJECT_BONUS + IMPORT_BONUS;

fn unknown_assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(app|application)\s*=\s*[A-Za-z_][\w.]*\s*\(").expect("valid regex")
    })
}

/// Position of a conventional file name, or `None`
pub fn conventional_rank(file_name: &str) -> Option<usize> {
    CONVENTIONAL_NAMES.iter().position(|n| *n == file_name)
}

/// Static entry point detector.
///
/// Walks a tree in sorted order and scores every top-level application object
/// declaration it finds. The same tree always yields the same ranked list.
#[derive(Debug, Clone)]
pub struct EntryPointDetector {
    max_depth: usize,
    max_files: usize,
    max_file_size: u64,
}

impl Default for EntryPointDetector {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_files: 2000,
            max_file_size: 512 * 1024,
        }
    }
}

#[derive(Debug)]
struct Declaration {
    kind: FrameworkKind,
    symbol: String,
    line: usize,
}

impl EntryPointDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_depth: usize, max_files: usize, max_file_size: u64) -> Self {
        Self {
            max_depth,
            max_files,
            max_file_size,
        }
    }

    /// Ranked candidates, best first. Empty when nothing was recognised.
    pub fn detect<F: FileSystem>(&self, fs: &F, root: &Path) -> Vec<EntryPointCandidate> {
        let files = self.collect_python_files(fs, root);
        debug!(files = files.len(), root = %root.display(), "Scanning Python sources");

        let mut candidates = Vec::new();
        for (path, size) in files {
            if size > self.max_file_size {
                debug!(path = %path.display(), size, "Skipping oversized file");
                continue;
            }
            let content = match fs.read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable source file");
                    continue;
                }
            };
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            candidates.extend(self.scan_file(&relative, &content));
        }

        candidates.sort_by(|a, b| {
            b.confidence_score
                .cmp(&a.confidence_score)
                .then_with(|| precedence(a).cmp(&precedence(b)))
                .then_with(|| a.depth().cmp(&b.depth()))
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.line.cmp(&b.line))
        });

        debug!(candidates = candidates.len(), "Entry point detection finished");
        candidates
    }

    /// Scores the declarations in one file; `relative` is the path under the root
    pub fn scan_file(&self, relative: &Path, content: &str) -> Vec<EntryPointCandidate> {
        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let conventional = conventional_rank(&file_name).is_some();
        let nested = relative.components().count() > 1;

        let location_bonus = match (conventional, nested) {
            (true, false) => ROOT_CONVENTIONAL_BONUS,
            (true, true) => NESTED_CONVENTIONAL_BONUS,
            (false, _) => 0,
        };

        let lines = code_lines(content);
        let mut declarations: Vec<Declaration> = Vec::new();
        let mut imported: Vec<FrameworkKind> = Vec::new();

        for line in &lines {
            for kind in FrameworkKind::RECOGNIZED {
                let Some(signature) = kind.signature() else {
                    continue;
                };
                if signature.imports_framework(line.text) && !imported.contains(&kind) {
                    imported.push(kind);
                }
                if line.is_top_level() {
                    if let Some(symbol) = signature.declared_symbol(line.text) {
                        declarations.push(Declaration {
                            kind,
                            symbol,
                            line: line.number,
                        });
                    }
                }
            }
        }

        if declarations.is_empty() {
            if !conventional {
                return Vec::new();
            }
            return lines
                .iter()
                .filter(|l| l.is_top_level())
                .filter_map(|l| {
                    unknown_assignment_regex()
                        .captures(l.text)
                        .map(|caps| (caps[1].to_string(), l.number))
                })
                .map(|(symbol, line)| {
                    EntryPointCandidate::new(
                        relative.to_path_buf(),
                        FrameworkKind::Unknown,
                        symbol,
                        location_bonus / 2,
                        line,
                    )
                })
                .collect();
        }

        let object_bonus = if declarations.len() == 1 {
            SINGLE_OBJECT_BONUS
        } else {
            MULTIPLE_OBJECT_BONUS
        };

        declarations
            .into_iter()
            .map(|decl| {
                let import_bonus = if imported.contains(&decl.kind) {
                    IMPORT_BONUS
                } else {
                    0
                };
                EntryPointCandidate::new(
                    relative.to_path_buf(),
                    decl.kind,
                    decl.symbol,
                    location_bonus + object_bonus + import_bonus,
                    decl.line,
                )
            })
            .collect()
    }

    /// Sorted, bounded walk returning `(path, size)` of every `.py` file
    fn collect_python_files<F: FileSystem>(&self, fs: &F, root: &Path) -> Vec<(PathBuf, u64)> {
        let mut files = Vec::new();
        let mut stack: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];

        // depth-first, children pushed in reverse so sorted order is kept
        while let Some((dir, depth)) = stack.pop() {
            let entries = match fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot list directory");
                    continue;
                }
            };

            let mut subdirs = Vec::new();
            for entry in entries {
                if entry.is_file() && entry.file_name().ends_with(".py") {
                    if files.len() >= self.max_files {
                        warn!(limit = self.max_files, "File limit reached; remaining files not scanned");
                        return files;
                    }
                    files.push((entry.path().to_path_buf(), entry.size));
                } else if entry.is_dir()
                    && depth < self.max_depth
                    && !is_excluded_dir(entry.file_name())
                {
                    subdirs.push((entry.path().to_path_buf(), depth + 1));
                }
            }
            stack.extend(subdirs.into_iter().rev());
        }

        files
    }
}

fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name) || name.starts_with('.') || name.ends_with(".egg-info")
}

fn precedence(candidate: &EntryPointCandidate) -> usize {
    candidate
        .file_path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(conventional_rank)
        .unwrap_or(CONVENTIONAL_NAMES.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    const FASTAPI_MAIN: &str = "from fastapi import FastAPI\n\napp = FastAPI()\n\n@app.get('/')\ndef root():\n    return {}\n";
    const FLASK_APP: &str = "from flask import Flask\napp = Flask(__name__)\n";

    fn detect(fs: &MockFileSystem) -> Vec<EntryPointCandidate> {
        EntryPointDetector::new().detect(fs, Path::new("/mock"))
    }

    #[test]
    fn test_conventional_main_top_confidence() {
        let fs = MockFileSystem::new();
        fs.add_file("main.py", FASTAPI_MAIN);
        fs.add_file("README.md", "app = FastAPI()");

        let candidates = detect(&fs);
        assert_eq!(candidates.len(), 1);
        let best = &candidates[0];
        assert_eq!(best.file_path, PathBuf::from("main.py"));
        assert_eq!(best.framework_kind, FrameworkKind::FastApi);
        assert_eq!(best.application_symbol, "app");
        assert_eq!(best.confidence_score, MAX_CONFIDENCE);
        assert_eq!(best.line, 3);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let fs = MockFileSystem::new();
        fs.add_file("main.py", FASTAPI_MAIN);
        fs.add_file("app.py", FLASK_APP);
        fs.add_file("svc/server.py", FASTAPI_MAIN);
        fs.add_file("tools/other.py", "api = FastAPI()\n");

        let first = detect(&fs);
        for _ in 0..5 {
            assert_eq!(detect(&fs), first);
        }
    }

    #[test]
    fn test_precedence_breaks_ties() {
        let fs = MockFileSystem::new();
        fs.add_file("server.py", FASTAPI_MAIN);
        fs.add_file("app.py", FLASK_APP);
        fs.add_file("main.py", FASTAPI_MAIN);

        let candidates = detect(&fs);
        let files: Vec<_> = candidates.iter().map(|c| c.file_path.clone()).collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("main.py"),
                PathBuf::from("app.py"),
                PathBuf::from("server.py")
            ]
        );
        assert!(candidates.iter().all(|c| c.confidence_score == MAX_CONFIDENCE));
    }

    #[test]
    fn test_multiple_objects_lower_confidence() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "main.py",
            "from fastapi import FastAPI\napp = FastAPI()\nadmin = FastAPI()\n",
        );

        let candidates = detect(&fs);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].application_symbol, "app");
        assert_eq!(candidates[0].confidence_score, 50 + 10 + 10);
        assert_eq!(candidates[1].application_symbol, "admin");
    }

    #[test]
    fn test_non_conventional_file_lower_confidence() {
        let fs = MockFileSystem::new();
        fs.add_file("service/application_factory.py", FLASK_APP);

        let candidates = detect(&fs);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].framework_kind, FrameworkKind::Flask);
        assert_eq!(candidates[0].confidence_score, 40 + 10);
    }

    #[test]
    fn test_nested_conventional_beats_non_conventional() {
        let fs = MockFileSystem::new();
        fs.add_file("a_module.py", FASTAPI_MAIN);
        fs.add_file("src/main.py", FASTAPI_MAIN);

        let candidates = detect(&fs);
        assert_eq!(candidates[0].file_path, PathBuf::from("src/main.py"));
        assert_eq!(candidates[0].confidence_score, 30 + 40 + 10);
        assert_eq!(candidates[1].confidence_score, 40 + 10);
    }

    #[test]
    fn test_missing_import_costs_points() {
        let fs = MockFileSystem::new();
        fs.add_file("main.py", "from something import *\napp = FastAPI()\n");

        let candidates = detect(&fs);
        assert_eq!(candidates[0].confidence_score, 50 + 40);
    }

    #[test]
    fn test_no_application_objects() {
        let fs = MockFileSystem::new();
        fs.add_file("main.py", "print('hello')\n");
        fs.add_file("lib/util.py", "def helper():\n    app = FastAPI()\n");

        assert!(detect(&fs).is_empty());
    }

    #[test]
    fn test_docstring_and_comment_ignored() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "main.py",
            "\"\"\"\napp = FastAPI()\n\"\"\"\n# app = FastAPI()\nx = 1\n",
        );

        assert!(detect(&fs).is_empty());
    }

    #[test]
    fn test_unknown_callable_in_conventional_file() {
        let fs = MockFileSystem::new();
        fs.add_file("app.py", "from starlette.applications import Starlette\napp = Starlette()\n");
        fs.add_file("lib/other.py", "app = Starlette()\n");

        let candidates = detect(&fs);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].framework_kind, FrameworkKind::Unknown);
        assert_eq!(candidates[0].confidence_score, 25);
        assert!(candidates[0].launch(8000).is_none());
    }

    #[test]
    fn test_excluded_directories_skipped() {
        let fs = MockFileSystem::new();
        fs.add_file("venv/lib/main.py", FASTAPI_MAIN);
        fs.add_file(".git/hooks/main.py", FASTAPI_MAIN);
        fs.add_file("node_modules/x/app.py", FLASK_APP);
        fs.add_file("pkg.egg-info/main.py", FASTAPI_MAIN);

        assert!(detect(&fs).is_empty());
    }

    #[test]
    fn test_limits() {
        let fs = MockFileSystem::new();
        fs.add_file("a/b/c/main.py", FASTAPI_MAIN);
        fs.add_file("big.py", &format!("{}{}", FASTAPI_MAIN, "#".repeat(100)));

        let shallow = EntryPointDetector::with_limits(1, 2000, 512 * 1024);
        let candidates = shallow.detect(&fs, Path::new("/mock"));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].file_path, PathBuf::from("big.py"));

        let tiny = EntryPointDetector::with_limits(6, 2000, 10);
        assert!(tiny.detect(&fs, Path::new("/mock")).is_empty());

        let one_file = EntryPointDetector::with_limits(6, 1, 512 * 1024);
        assert_eq!(one_file.detect(&fs, Path::new("/mock")).len(), 1);
    }
}
