//! Single requirement line parsing

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// How a requirement pins its version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// `fastapi`
    Bare,
    /// `fastapi>=0.100` or anything with a marker
    Ranged,
    /// `fastapi==0.110.0`
    Pinned,
    /// `name @ https://...` or `-e git+https://...#egg=name`
    Url,
}

/// One installable line of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Name as written, without extras
    pub name: String,
    /// PEP 503 normalised name used as the dedup key
    pub key: String,
    pub extras: Option<String>,
    /// The install spec, passed verbatim to the installer
    pub spec: String,
    pub constraint: Constraint,
    /// 1-based line number in the manifest
    pub line: usize,
}

impl Requirement {
    /// Name plus extras, e.g. `uvicorn[standard]`
    pub fn bare_spec(&self) -> String {
        match &self.extras {
            Some(extras) => format!("{}{}", self.name, extras),
            None => self.name.clone(),
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.constraint == Constraint::Pinned
    }
}

/// What a non-blank, non-comment manifest line turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine {
    Requirement(Requirement),
    /// Installer option such as `-r base.txt` or `--index-url ...`
    Option(String),
    Invalid(String),
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(\[[^\]]*\])?\s*(.*)$")
            .expect("valid regex")
    })
}

fn egg_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"#egg=([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)").expect("valid regex")
    })
}

fn normalize_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-_.]+").expect("valid regex"))
}

/// PEP 503 name normalisation: lowercase, runs of `-`, `_`, `.` become `-`
pub fn normalize_name(name: &str) -> String {
    normalize_regex()
        .replace_all(&name.trim().to_lowercase(), "-")
        .into_owned()
}

/// Removes a trailing ` # comment`. A `#` glued to a token (URL fragments) stays.
pub fn strip_inline_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && i > 0 && bytes[i - 1].is_ascii_whitespace() {
            return line[..i].trim_end();
        }
    }
    line.trim_end()
}

fn is_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    ["http://", "https://", "git+", "hg+", "svn+", "bzr+", "file:"]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// Classifies one logical manifest line (comment already stripped, non-empty)
pub fn parse_line(text: &str, line: usize) -> ManifestLine {
    let text = text.trim();

    if let Some(rest) = text
        .strip_prefix("-e ")
        .or_else(|| text.strip_prefix("--editable "))
        .or_else(|| text.strip_prefix("--editable="))
    {
        return parse_url_requirement(rest.trim(), text, line);
    }

    if text.starts_with('-') {
        return ManifestLine::Option(text.to_string());
    }

    if is_url(text) {
        return parse_url_requirement(text, text, line);
    }

    let Some(caps) = name_regex().captures(text) else {
        return ManifestLine::Invalid(text.to_string());
    };

    let name = caps[1].to_string();
    let extras = caps.get(2).map(|m| m.as_str().replace(' ', ""));
    let rest = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");

    let constraint = if rest.is_empty() {
        Constraint::Bare
    } else if let Some(url) = rest.strip_prefix('@') {
        if url.trim().is_empty() {
            return ManifestLine::Invalid(text.to_string());
        }
        Constraint::Url
    } else if rest.starts_with(['=', '<', '>', '~', '!', ';', '(']) {
        let version_part = rest.split(';').next().unwrap_or("");
        if version_part.contains("==") && !version_part.contains('*') {
            Constraint::Pinned
        } else {
            Constraint::Ranged
        }
    } else {
        return ManifestLine::Invalid(text.to_string());
    };

    ManifestLine::Requirement(Requirement {
        key: normalize_name(&name),
        name,
        extras,
        spec: text.to_string(),
        constraint,
        line,
    })
}

fn parse_url_requirement(url: &str, spec: &str, line: usize) -> ManifestLine {
    match egg_regex().captures(url) {
        Some(caps) => {
            let name = caps[1].to_string();
            ManifestLine::Requirement(Requirement {
                key: normalize_name(&name),
                name,
                extras: None,
                spec: spec.to_string(),
                constraint: Constraint::Url,
                line,
            })
        }
        None => ManifestLine::Invalid(spec.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn req(text: &str) -> Requirement {
        match parse_line(text, 1) {
            ManifestLine::Requirement(r) => r,
            other => panic!("expected requirement, got {:?}", other),
        }
    }

    #[parameterized(
        plain = { "fastapi", "fastapi" },
        upper = { "Flask", "flask" },
        underscore = { "typing_extensions", "typing-extensions" },
        dots = { "zope.interface", "zope-interface" },
        runs = { "A__b-.C", "a-b-c" },
    )]
    fn test_normalize_name(input: &str, expected: &str) {
        assert_eq!(normalize_name(input), expected);
    }

    #[parameterized(
        bare = { "uvicorn", Constraint::Bare },
        pinned = { "fastapi==0.110.0", Constraint::Pinned },
        pinned_spaced = { "fastapi == 0.110.0", Constraint::Pinned },
        wildcard = { "fastapi==0.110.*", Constraint::Ranged },
        ranged = { "pydantic>=2,<3", Constraint::Ranged },
        compatible = { "requests~=2.31", Constraint::Ranged },
        marker_only = { "uvloop; sys_platform != 'win32'", Constraint::Ranged },
        direct_url = { "mypkg @ https://example.com/mypkg-1.0.tar.gz", Constraint::Url },
    )]
    fn test_constraint_classification(line: &str, expected: Constraint) {
        assert_eq!(req(line).constraint, expected);
    }

    #[test]
    fn test_extras() {
        let r = req("uvicorn[standard]>=0.23");
        assert_eq!(r.name, "uvicorn");
        assert_eq!(r.extras.as_deref(), Some("[standard]"));
        assert_eq!(r.bare_spec(), "uvicorn[standard]");
        assert_eq!(r.spec, "uvicorn[standard]>=0.23");
    }

    #[test]
    fn test_editable_with_egg() {
        let r = req("-e git+https://github.com/octo/lib.git#egg=octo_lib");
        assert_eq!(r.key, "octo-lib");
        assert_eq!(r.constraint, Constraint::Url);
        assert_eq!(r.spec, "-e git+https://github.com/octo/lib.git#egg=octo_lib");
    }

    #[test]
    fn test_url_without_egg_is_invalid() {
        assert!(matches!(
            parse_line("https://example.com/pkg.whl", 4),
            ManifestLine::Invalid(_)
        ));
    }

    #[parameterized(
        requirement_file = { "-r base.txt" },
        constraint_file = { "-c constraints.txt" },
        index = { "--index-url https://pypi.example.com/simple" },
        extra_index = { "--extra-index-url https://x" },
    )]
    fn test_option_lines(line: &str) {
        assert_eq!(parse_line(line, 1), ManifestLine::Option(line.to_string()));
    }

    #[test]
    fn test_invalid_line() {
        assert!(matches!(parse_line("not a package!", 2), ManifestLine::Invalid(_)));
        assert!(matches!(parse_line("pkg @", 2), ManifestLine::Invalid(_)));
    }

    #[test]
    fn test_strip_inline_comment() {
        assert_eq!(strip_inline_comment("fastapi  # web"), "fastapi");
        assert_eq!(strip_inline_comment("# only comment"), "");
        assert_eq!(
            strip_inline_comment("-e git+https://x/y.git#egg=y"),
            "-e git+https://x/y.git#egg=y"
        );
    }
}
