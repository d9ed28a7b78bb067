//! Bash building blocks shared by every step
//!
//! Each step script is a standalone program: it re-declares the remote paths,
//! reports its result on a `NBDEPLOY_SIGNAL` line, and durable steps guard
//! themselves with a completion marker so a re-run skips finished work.

use sha2::{Digest, Sha256};

pub const SIGNAL_PREFIX: &str = "NBDEPLOY_SIGNAL";
pub const URL_PREFIX: &str = "NBDEPLOY_URL";

/// Single-quotes `value` for bash
pub fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Hex sha256 of `parts`, NUL separated
pub fn fingerprint<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Remote paths every step agrees on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    pub workdir: String,
    pub state_dir: String,
}

impl RemoteLayout {
    /// Common header: strict mode, paths, signal and retry helpers.
    ///
    /// A step that exits non-zero without having signalled, for instance
    /// when `set -e` aborts it, reports `failed` from the exit trap.
    pub fn prelude(&self, label: &str) -> String {
        format!(
            r#"set -Eeuo pipefail
NBDEPLOY_WORKDIR={workdir}
NBDEPLOY_STATE={state}
NBDEPLOY_SIGNALLED=0
nbdeploy_signal() {{
  NBDEPLOY_SIGNALLED=1
  echo "{signal} step={label} result=$1"
}}
nbdeploy_on_exit() {{
  if [ "$1" -ne 0 ] && [ "$NBDEPLOY_SIGNALLED" -eq 0 ]; then
    nbdeploy_signal failed
  fi
}}
trap 'nbdeploy_on_exit $?' EXIT
mkdir -p "$NBDEPLOY_STATE/markers"
nbdeploy_retry() {{
  local attempts="$1"; shift
  local n=1
  until "$@"; do
    if [ "$n" -ge "$attempts" ]; then return 1; fi
    n=$((n + 1))
    echo "retrying (attempt $n of $attempts)" >&2
    sleep 2
  done
}}
"#,
            workdir = sh_quote(&self.workdir),
            state = sh_quote(&self.state_dir),
            signal = SIGNAL_PREFIX,
            label = label,
        )
    }

    /// A step that runs once: skipped when its marker exists, marked on success.
    ///
    /// `body` may set `NBDEPLOY_RESULT=warned`; it must `exit` itself on a
    /// failure that should leave the step unmarked.
    pub fn durable(&self, label: &str, body: &str) -> String {
        let hash = fingerprint([label, body]);
        format!(
            r#"{prelude}NBDEPLOY_MARKER="$NBDEPLOY_STATE/markers/{label}-{hash}"
if [ -f "$NBDEPLOY_MARKER" ]; then
  echo "{label}: already completed, skipping"
  nbdeploy_signal skipped
  exit 0
fi
NBDEPLOY_RESULT=ok
{body}
touch "$NBDEPLOY_MARKER"
nbdeploy_signal "$NBDEPLOY_RESULT"
"#,
            prelude = self.prelude(label),
            label = label,
            hash = &hash[..12],
            body = body.trim_end(),
        )
    }

    /// A step guarded by a liveness probe instead of a marker
    pub fn live(&self, label: &str, body: &str) -> String {
        format!("{}{}\n", self.prelude(label), body.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> RemoteLayout {
        RemoteLayout {
            workdir: "/content/app".to_string(),
            state_dir: "/content/.nbdeploy".to_string(),
        }
    }

    #[test]
    fn test_sh_quote() {
        assert_eq!(sh_quote("fastapi"), "'fastapi'");
        assert_eq!(
            sh_quote("uvloop; sys_platform != 'win32'"),
            r"'uvloop; sys_platform != '\''win32'\'''"
        );
    }

    #[test]
    fn test_fingerprint_is_stable_and_separated() {
        assert_eq!(fingerprint(["a", "b"]), fingerprint(["a", "b"]));
        assert_ne!(fingerprint(["ab", ""]), fingerprint(["a", "b"]));
        assert_eq!(fingerprint(["x"]).len(), 64);
    }

    #[test]
    fn test_prelude() {
        let prelude = layout().prelude("01-fetch");
        assert!(prelude.starts_with("set -Eeuo pipefail\n"));
        assert!(prelude.contains("NBDEPLOY_WORKDIR='/content/app'"));
        assert!(prelude.contains("NBDEPLOY_SIGNAL step=01-fetch result=$1"));
        assert!(prelude.contains("trap 'nbdeploy_on_exit $?' EXIT"));
        // the trap is armed before the first command that can fail
        assert!(prelude.find("trap ").unwrap() < prelude.find("mkdir -p").unwrap());
    }

    #[test]
    fn test_durable_marker_depends_on_body() {
        let a = layout().durable("03-install-x", "echo one");
        let b = layout().durable("03-install-x", "echo two");
        assert!(a.contains("NBDEPLOY_MARKER=\"$NBDEPLOY_STATE/markers/03-install-x-"));
        assert!(a.contains("nbdeploy_signal skipped"));
        assert_ne!(a, b);
        assert_eq!(a, layout().durable("03-install-x", "echo one"));
    }

    #[test]
    fn test_live_has_no_marker() {
        let script = layout().live("07-start-server", "echo hi");
        assert!(!script.contains("NBDEPLOY_MARKER"));
        assert!(script.ends_with("echo hi\n"));
    }
}
