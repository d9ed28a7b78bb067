//! Line-level view of Python source
//!
//! Yields the code lines of a module, leaving out comment lines and the
//! contents of triple-quoted strings, so that docstrings showing
//! `app = FastAPI()` in an example are not mistaken for declarations.

/// A line of code with its 1-based number and indentation width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLine<'a> {
    pub number: usize,
    pub indent: usize,
    pub text: &'a str,
}

impl CodeLine<'_> {
    pub fn is_top_level(&self) -> bool {
        self.indent == 0
    }
}

const DELIMITERS: [&str; 2] = ["\"\"\"", "'''"];

/// Splits `source` into code lines
pub fn code_lines(source: &str) -> Vec<CodeLine<'_>> {
    let mut lines = Vec::new();
    let mut open: Option<&'static str> = None;

    for (idx, raw) in source.lines().enumerate() {
        let raw = raw.trim_end_matches('\r');
        let mut rest = raw;
        let mut code_end: Option<usize> = None;

        if let Some(delim) = open {
            match rest.find(delim) {
                // the remainder after a closing delimiter is not treated as code
                Some(pos) => {
                    rest = &rest[pos + delim.len()..];
                    open = scan_openings(rest);
                    continue;
                }
                None => continue,
            }
        }

        if let Some((pos, _)) = first_delimiter(rest) {
            code_end = Some(pos);
            open = scan_openings(rest);
        }

        let code = match code_end {
            Some(end) => &raw[..end],
            None => raw,
        };
        let trimmed = code.trim_start();
        if trimmed.trim_end().is_empty() || trimmed.starts_with('#') {
            continue;
        }

        lines.push(CodeLine {
            number: idx + 1,
            indent: code.len() - trimmed.len(),
            text: code.trim_end(),
        });
    }

    lines
}

fn first_delimiter(s: &str) -> Option<(usize, &'static str)> {
    DELIMITERS
        .iter()
        .filter_map(|d| s.find(d).map(|pos| (pos, *d)))
        .min_by_key(|(pos, _)| *pos)
}

/// Walks `s` toggling triple-quoted strings; returns the delimiter left open
fn scan_openings(s: &str) -> Option<&'static str> {
    let mut rest = s;
    loop {
        let (pos, delim) = first_delimiter(rest)?;
        rest = &rest[pos + delim.len()..];
        match rest.find(delim) {
            Some(close) => rest = &rest[close + delim.len()..],
            None => return Some(delim),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<&str> {
        code_lines(source).into_iter().map(|l| l.text).collect()
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let source = "# app = FastAPI()\n\nimport os\n    # indented comment\napp = 1\n";
        assert_eq!(texts(source), vec!["import os", "app = 1"]);
    }

    #[test]
    fn test_skips_docstrings() {
        let source = r#""""Service.

Usage:
app = FastAPI()
"""
from fastapi import FastAPI
app = FastAPI()
"#;
        let lines = code_lines(source);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "from fastapi import FastAPI");
        assert_eq!(lines[1].number, 7);
    }

    #[test]
    fn test_single_line_docstring() {
        let source = "'''one liner'''\napp = Flask(__name__)\n";
        assert_eq!(texts(source), vec!["app = Flask(__name__)"]);
    }

    #[test]
    fn test_code_before_opening_delimiter_kept() {
        let source = "HELP = \"\"\"\napp = FastAPI()\n\"\"\"\nx = 1\n";
        assert_eq!(texts(source), vec!["HELP =", "x = 1"]);
    }

    #[test]
    fn test_mixed_delimiters() {
        let source = "s = '''has \"\"\" inside\nstill string\n'''\nreal = 1\n";
        assert_eq!(texts(source), vec!["s =", "real = 1"]);
    }

    #[test]
    fn test_indentation() {
        let lines = code_lines("def f():\n    app = FastAPI()\n\tx = 2\n");
        assert!(lines[0].is_top_level());
        assert_eq!(lines[1].indent, 4);
        assert!(!lines[2].is_top_level());
    }
}
