use crate::artifact::script::{SIGNAL_PREFIX, URL_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result a step reports on its signal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepResult {
    Ok,
    Warned,
    Failed,
    Skipped,
}

impl FromStr for StepResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(StepResult::Ok),
            "warned" => Ok(StepResult::Warned),
            "failed" => Ok(StepResult::Failed),
            "skipped" => Ok(StepResult::Skipped),
            other => Err(format!("unknown step result '{}'", other)),
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepResult::Ok => "ok",
            StepResult::Warned => "warned",
            StepResult::Failed => "failed",
            StepResult::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSignal {
    pub label: String,
    pub result: StepResult,
}

/// Signals read back from the output of an artifact run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// One entry per step label, in first-seen order, holding the latest result
    pub steps: Vec<StepSignal>,
    pub public_url: Option<String>,
}

impl ExecutionReport {
    /// Reads `NBDEPLOY_SIGNAL` and `NBDEPLOY_URL` lines; everything else is ignored.
    ///
    /// A step that ran more than once keeps its position and takes the later
    /// result. The last URL line wins.
    pub fn parse(log: &str) -> Self {
        let mut report = ExecutionReport::default();

        for line in log.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix(SIGNAL_PREFIX) {
                if let Some(signal) = parse_signal(rest) {
                    match report.steps.iter_mut().find(|s| s.label == signal.label) {
                        Some(existing) => existing.result = signal.result,
                        None => report.steps.push(signal),
                    }
                }
            } else if let Some(rest) = line.strip_prefix(URL_PREFIX) {
                let url = rest.trim();
                if url.starts_with("http://") || url.starts_with("https://") {
                    report.public_url = Some(url.to_string());
                }
            }
        }

        report
    }

    pub fn result_of(&self, label: &str) -> Option<StepResult> {
        self.steps.iter().find(|s| s.label == label).map(|s| s.result)
    }

    pub fn failed(&self) -> impl Iterator<Item = &StepSignal> {
        self.steps.iter().filter(|s| s.result == StepResult::Failed)
    }
}

fn parse_signal(rest: &str) -> Option<StepSignal> {
    let mut label = None;
    let mut result = None;
    for field in rest.split_whitespace() {
        if let Some(value) = field.strip_prefix("step=") {
            label = Some(value.to_string());
        } else if let Some(value) = field.strip_prefix("result=") {
            result = value.parse::<StepResult>().ok();
        }
    }
    Some(StepSignal {
        label: label.filter(|l| !l.is_empty())?,
        result: result?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
==> 01-fetch
NBDEPLOY_SIGNAL step=01-fetch result=ok
Collecting fastapi
NBDEPLOY_SIGNAL step=02-install-fastapi result=failed
NBDEPLOY_SIGNAL step=02-install-fastapi result=ok
  NBDEPLOY_SIGNAL step=03-start-tunnel result=skipped
NBDEPLOY_SIGNAL step=04-report-url result=bogus
NBDEPLOY_URL https://abcd.ngrok-free.app
";

    #[test]
    fn test_parse_signals() {
        let report = ExecutionReport::parse(LOG);
        assert_eq!(report.steps.len(), 3);
        assert_eq!(report.steps[0].label, "01-fetch");
        assert_eq!(report.result_of("02-install-fastapi"), Some(StepResult::Ok));
        assert_eq!(report.result_of("03-start-tunnel"), Some(StepResult::Skipped));
        assert_eq!(report.result_of("04-report-url"), None);
        assert_eq!(
            report.public_url.as_deref(),
            Some("https://abcd.ngrok-free.app")
        );
        assert_eq!(report.failed().count(), 0);
    }

    #[test]
    fn test_empty_log() {
        let report = ExecutionReport::parse("");
        assert!(report.steps.is_empty());
        assert!(report.public_url.is_none());
    }

    #[test]
    fn test_url_placeholder_is_ignored() {
        let report = ExecutionReport::parse("NBDEPLOY_URL $NBDEPLOY_PUBLIC_URL\n");
        assert!(report.public_url.is_none());
    }

    #[test]
    fn test_step_result_parsing() {
        assert_eq!("warned".parse::<StepResult>(), Ok(StepResult::Warned));
        assert!("nope".parse::<StepResult>().is_err());
        assert_eq!(StepResult::Skipped.to_string(), "skipped");
    }
}
