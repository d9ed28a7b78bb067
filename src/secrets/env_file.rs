//! `.env` payload parsing

use super::value::SecretValue;
use crate::error::{DeploymentIssue, SecretLineIssue};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

const SENSITIVE_MARKERS: &[&str] = &["password", "secret", "key", "token"];

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

pub fn is_valid_key(key: &str) -> bool {
    key_regex().is_match(key)
}

/// Whether a variable name suggests a credential
pub fn is_sensitive(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Validated variables in first-seen order. Values are redacted when printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSet {
    entries: Vec<(String, SecretValue)>,
}

impl SecretSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces; a replaced key keeps its position
    pub fn insert(&mut self, key: String, value: SecretValue) -> Option<SecretValue> {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&SecretValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn sensitive_keys(&self) -> Vec<&str> {
        self.keys().into_iter().filter(|k| is_sensitive(k)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Something the parser decided about a line, in file order
#[derive(Debug, Clone, PartialEq)]
pub enum SecretEvent {
    /// Line dropped; carries a `SecretParseWarning`
    Dropped(DeploymentIssue),
    /// Key seen again; the later value wins
    Overridden { key: String, first_line: usize, line: usize },
}

impl fmt::Display for SecretEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretEvent::Dropped(issue) => write!(f, "{}", issue),
            SecretEvent::Overridden {
                key,
                first_line,
                line,
            } => write!(
                f,
                "env line {}: {} redefined (first set on line {}); later value wins",
                line, key, first_line
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecretsOutcome {
    pub secrets: SecretSet,
    pub events: Vec<SecretEvent>,
}

impl SecretsOutcome {
    pub fn warning_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SecretEvent::Dropped(_)))
            .count()
    }

    /// One-line summary naming keys only
    pub fn summary(&self) -> String {
        if self.secrets.is_empty() {
            return "no secrets recognized".to_string();
        }
        format!(
            "recognized {} secret(s): {}",
            self.secrets.len(),
            self.secrets.keys().join(", ")
        )
    }
}

/// Parses an optional env payload into a [`SecretSet`]
#[derive(Debug, Clone, Default)]
pub struct SecretsInjector;

impl SecretsInjector {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, payload: Option<&[u8]>) -> SecretsOutcome {
        let Some(bytes) = payload else {
            return SecretsOutcome::default();
        };

        let text = String::from_utf8_lossy(bytes);
        let mut outcome = SecretsOutcome::default();
        let mut first_seen: Vec<(String, usize)> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim().trim_start_matches('\u{feff}');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match parse_assignment(line) {
                Ok((key, value)) => {
                    if let Some((_, first_line)) = first_seen.iter().find(|(k, _)| *k == key) {
                        outcome.events.push(SecretEvent::Overridden {
                            key: key.clone(),
                            first_line: *first_line,
                            line: line_no,
                        });
                    } else {
                        first_seen.push((key.clone(), line_no));
                    }
                    debug!(key = %key, line = line_no, "Secret recognized");
                    outcome.secrets.insert(key, value);
                }
                Err(issue) => {
                    warn!(line = line_no, reason = %issue, "Env line dropped");
                    outcome
                        .events
                        .push(SecretEvent::Dropped(DeploymentIssue::SecretParseWarning {
                            line: line_no,
                            issue,
                        }));
                }
            }
        }

        outcome
    }
}

fn parse_assignment(line: &str) -> Result<(String, SecretValue), SecretLineIssue> {
    let line = line
        .strip_prefix("export ")
        .map(str::trim_start)
        .unwrap_or(line);

    let (key, value) = line
        .split_once('=')
        .ok_or(SecretLineIssue::MissingSeparator)?;

    let key = key.trim();
    if key.is_empty() {
        return Err(SecretLineIssue::EmptyKey);
    }
    if !is_valid_key(key) {
        return Err(SecretLineIssue::InvalidKey(key.to_string()));
    }

    Ok((key.to_string(), SecretValue::new(unquote(value.trim()))))
}

/// Strips one layer of matching single or double quotes
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn parse(text: &str) -> SecretsOutcome {
        SecretsInjector::new().parse(Some(text.as_bytes()))
    }

    #[test]
    fn test_scenario_with_comment_and_bad_line() {
        let outcome = parse("API_KEY=abc\n# comment\nBAD LINE");

        assert_eq!(outcome.secrets.len(), 1);
        assert_eq!(outcome.secrets.get("API_KEY").unwrap().expose(), "abc");
        assert_eq!(outcome.warning_count(), 1);
        assert_eq!(
            outcome.events[0].to_string(),
            "warning: env line 3 dropped: expected KEY=VALUE"
        );
        for event in &outcome.events {
            assert!(!event.to_string().contains("abc"));
        }
        assert!(!outcome.summary().contains("abc"));
    }

    #[test]
    fn test_no_payload() {
        let outcome = SecretsInjector::new().parse(None);
        assert!(outcome.secrets.is_empty());
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.summary(), "no secrets recognized");
    }

    #[parameterized(
        double = { "A=\"x y\"", "x y" },
        single = { "A='x'", "x" },
        unbalanced = { "A=\"x", "\"x" },
        equals_in_value = { "A=b=c", "b=c" },
        empty = { "A=", "" },
        export = { "export A=1", "1" },
        spaces = { "  A  =  v  ", "v" },
    )]
    fn test_values(line: &str, expected: &str) {
        let outcome = parse(line);
        assert_eq!(outcome.secrets.get("A").unwrap().expose(), expected);
        assert!(outcome.events.is_empty());
    }

    #[parameterized(
        missing_separator = { "JUSTAKEY", SecretLineIssue::MissingSeparator },
        empty_key = { "=value", SecretLineIssue::EmptyKey },
        digit_start = { "1KEY=v", SecretLineIssue::InvalidKey("1KEY".to_string()) },
        dash = { "MY-KEY=v", SecretLineIssue::InvalidKey("MY-KEY".to_string()) },
    )]
    fn test_dropped_lines(line: &str, expected: SecretLineIssue) {
        let outcome = parse(line);
        assert!(outcome.secrets.is_empty());
        assert_eq!(
            outcome.events,
            vec![SecretEvent::Dropped(DeploymentIssue::SecretParseWarning {
                line: 1,
                issue: expected,
            })]
        );
    }

    #[test]
    fn test_duplicate_last_wins() {
        let outcome = parse("TOKEN=one\nOTHER=x\nTOKEN=two\n");
        assert_eq!(outcome.secrets.keys(), vec!["TOKEN", "OTHER"]);
        assert_eq!(outcome.secrets.get("TOKEN").unwrap().expose(), "two");
        assert_eq!(outcome.events.len(), 1);
        let message = outcome.events[0].to_string();
        assert!(message.contains("TOKEN redefined"));
        assert!(!message.contains("one") && !message.contains("two"));
    }

    #[test]
    fn test_sensitive_keys() {
        let outcome = parse("DB_PASSWORD=x\nDEBUG=1\nGITHUB_TOKEN=y\napi_key=z");
        assert_eq!(
            outcome.secrets.sensitive_keys(),
            vec!["DB_PASSWORD", "GITHUB_TOKEN", "api_key"]
        );
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let outcome = SecretsInjector::new().parse(Some(b"NAME=caf\xe9\nOK=1"));
        assert_eq!(outcome.secrets.len(), 2);
    }

    #[test]
    fn test_debug_output_redacts_values() {
        let outcome = parse("API_KEY=abc");
        assert!(!format!("{:?}", outcome).contains("abc"));
    }
}
