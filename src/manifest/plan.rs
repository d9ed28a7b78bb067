use super::policy::FatalPolicy;
use super::requirement::{parse_line, strip_inline_comment, Constraint, ManifestLine, Requirement};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One install in the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Normalised package name; unique within a plan
    pub name: String,
    pub package_spec: String,
    /// A failed install is skipped with a warning instead of aborting
    pub is_optional: bool,
    /// Retried once with this spec when the first attempt fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_spec: Option<String>,
    /// Manifest line the winning spec came from
    pub source_line: usize,
}

impl DependencyEntry {
    pub fn is_fatal(&self) -> bool {
        !self.is_optional
    }
}

/// Ordered, deduplicated install plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyPlan {
    entries: Vec<DependencyEntry>,
}

impl DependencyPlan {
    pub fn entries(&self) -> &[DependencyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DependencyEntry> {
        let key = super::normalize_name(name);
        self.entries.iter().find(|e| e.name == key)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}

/// A plan together with the decisions taken while building it
#[derive(Debug, Clone, Default)]
pub struct ManifestOutcome {
    pub plan: DependencyPlan,
    /// Skipped lines and overrides, in manifest order
    pub notes: Vec<String>,
}

/// Turns manifest bytes into a [`DependencyPlan`]
#[derive(Debug, Clone, Default)]
pub struct DependencyPlanner {
    policy: FatalPolicy,
}

impl DependencyPlanner {
    pub fn new(policy: FatalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FatalPolicy {
        &self.policy
    }

    /// Parses the manifest. An empty plan is returned as-is; the caller
    /// decides that it means a missing manifest.
    pub fn plan(&self, manifest: &[u8]) -> ManifestOutcome {
        let text = String::from_utf8_lossy(manifest);
        let mut notes = Vec::new();

        // position of each key in `order`, winning requirement per key
        let mut order: Vec<String> = Vec::new();
        let mut winners: HashMap<String, Requirement> = HashMap::new();

        for (line_no, logical) in logical_lines(&text) {
            let stripped = strip_inline_comment(&logical);
            if stripped.trim().is_empty() {
                continue;
            }

            match parse_line(stripped, line_no) {
                ManifestLine::Requirement(req) => {
                    if let Some(previous) = winners.get(&req.key) {
                        let note = format!(
                            "manifest line {}: '{}' overrides '{}' from line {}",
                            line_no, req.spec, previous.spec, previous.line
                        );
                        debug!(package = %req.key, "{}", note);
                        notes.push(note);
                    } else {
                        order.push(req.key.clone());
                    }
                    winners.insert(req.key.clone(), req);
                }
                ManifestLine::Option(option) => {
                    let note = format!(
                        "manifest line {}: installer option '{}' skipped",
                        line_no, option
                    );
                    warn!("{}", note);
                    notes.push(note);
                }
                ManifestLine::Invalid(raw) => {
                    let note = format!(
                        "manifest line {}: '{}' is not a requirement; skipped",
                        line_no, raw
                    );
                    warn!("{}", note);
                    notes.push(note);
                }
            }
        }

        let entries = order
            .into_iter()
            .filter_map(|key| winners.remove(&key))
            .map(|req| self.entry_for(req))
            .collect::<Vec<_>>();

        debug!(entries = entries.len(), "Dependency plan built");

        ManifestOutcome {
            plan: DependencyPlan { entries },
            notes,
        }
    }

    fn entry_for(&self, req: Requirement) -> DependencyEntry {
        let fallback_spec = match req.constraint {
            Constraint::Ranged | Constraint::Pinned => Some(req.bare_spec()),
            Constraint::Bare | Constraint::Url => None,
        };

        DependencyEntry {
            is_optional: !self.policy.is_fatal(&req),
            name: req.key,
            package_spec: req.spec,
            fallback_spec,
            source_line: req.line,
        }
    }
}

/// Joins backslash continuations, yielding each logical line with the number
/// of the physical line it started on
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let raw = raw.trim_end_matches('\r');
        let (start, mut buf) = pending.take().unwrap_or((idx + 1, String::new()));

        if let Some(head) = raw.strip_suffix('\\') {
            buf.push_str(head);
            buf.push(' ');
            pending = Some((start, buf));
        } else {
            buf.push_str(raw);
            lines.push((start, buf));
        }
    }

    if let Some(rest) = pending {
        lines.push(rest);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(text: &str) -> ManifestOutcome {
        DependencyPlanner::default().plan(text.as_bytes())
    }

    #[test]
    fn test_duplicate_keeps_single_entry() {
        let outcome = plan("fastapi\nuvicorn\nfastapi");
        assert_eq!(outcome.plan.names(), vec!["fastapi", "uvicorn"]);
        assert_eq!(outcome.notes.len(), 1);
    }

    #[test]
    fn test_last_occurrence_wins_first_position_kept() {
        let outcome = plan("fastapi==0.100.0\nrequests\nFastAPI>=0.110\n");
        let entries = outcome.plan.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "fastapi");
        assert_eq!(entries[0].package_spec, "FastAPI>=0.110");
        assert_eq!(entries[0].source_line, 3);
        assert_eq!(entries[1].name, "requests");
    }

    #[test]
    fn test_blank_and_comment_lines() {
        let outcome = plan("\n# web\n   \nflask  # the app\n\t# indented comment\n");
        assert_eq!(outcome.plan.names(), vec!["flask"]);
        assert_eq!(outcome.plan.entries()[0].package_spec, "flask");
        assert!(outcome.notes.is_empty());
    }

    #[test]
    fn test_empty_and_comment_only_manifests() {
        assert!(plan("").plan.is_empty());
        assert!(plan("# nothing\n\n# here\n").plan.is_empty());
    }

    #[test]
    fn test_option_only_manifest_is_empty_with_note() {
        let outcome = plan("-r base.txt\n");
        assert!(outcome.plan.is_empty());
        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.notes[0].contains("-r base.txt"));
    }

    #[test]
    fn test_fatal_flags() {
        let outcome = plan("fastapi==0.110.0\nnumpy>=1.26\npandas");
        let plan = outcome.plan;
        assert!(plan.get("fastapi").unwrap().is_fatal());
        assert!(plan.get("numpy").unwrap().is_optional);
        assert!(plan.get("pandas").unwrap().is_optional);
    }

    #[test]
    fn test_fallback_specs() {
        let outcome =
            plan("uvicorn[standard]==0.29.0\nrequests\nlib @ https://example.com/lib.tar.gz");
        let plan = outcome.plan;
        assert_eq!(
            plan.get("uvicorn").unwrap().fallback_spec.as_deref(),
            Some("uvicorn[standard]")
        );
        assert_eq!(plan.get("requests").unwrap().fallback_spec, None);
        assert_eq!(plan.get("lib").unwrap().fallback_spec, None);
    }

    #[test]
    fn test_line_continuation() {
        let outcome = plan("pydantic>=2 \\\n  ; python_version >= '3.8'\nrequests");
        let entries = outcome.plan.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "pydantic");
        assert_eq!(entries[1].source_line, 3);
    }

    #[test]
    fn test_invalid_line_noted() {
        let outcome = plan("fastapi\n!!!\n");
        assert_eq!(outcome.plan.len(), 1);
        assert!(outcome.notes[0].starts_with("manifest line 2"));
    }

    #[test]
    fn test_crlf_and_invalid_utf8() {
        let mut bytes = b"flask\r\nreq\xffuests\r\n".to_vec();
        bytes.extend_from_slice(b"gunicorn\r\n");
        let outcome = DependencyPlanner::default().plan(&bytes);
        assert_eq!(outcome.plan.get("flask").unwrap().package_spec, "flask");
        assert!(outcome.plan.get("gunicorn").is_some());
    }

    #[test]
    fn test_custom_policy() {
        let planner = DependencyPlanner::new(FatalPolicy::from_list("numpy"));
        let outcome = planner.plan(b"fastapi\nnumpy");
        assert!(outcome.plan.get("fastapi").unwrap().is_optional);
        assert!(outcome.plan.get("numpy").unwrap().is_fatal());
    }

    #[test]
    fn test_deterministic() {
        let text = "b\na\nc==1\nA>=2\n";
        assert_eq!(plan(text).plan, plan(text).plan);
    }
}
