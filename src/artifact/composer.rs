use super::script::{fingerprint, sh_quote, RemoteLayout};
use super::{DeploymentArtifact, DeploymentStep, RecoveryPolicy, StepPurpose};
use crate::config::PlannerConfig;
use crate::detection::{path_to_slash, EntryPointCandidate};
use crate::error::DeploymentIssue;
use crate::fetch::{RepositoryInfo, RepositoryReference};
use crate::manifest::{DependencyEntry, DependencyPlan};
use crate::secrets::SecretSet;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use tracing::debug;

const FETCH_ATTEMPTS: u32 = 3;
const TUNNEL_ATTEMPTS: u32 = 2;

const TUNNEL_PROGRAM: &str = r#"import os
import pathlib
import time

from pyngrok import ngrok

state = pathlib.Path(os.environ["NBDEPLOY_STATE"])
token_file = state / "tunnel.token"
if token_file.exists():
    ngrok.set_auth_token(token_file.read_text().strip())
tunnel = ngrok.connect(int(os.environ["NBDEPLOY_PORT"]), "http")
(state / "public_url").write_text(tunnel.public_url)
while True:
    time.sleep(3600)
"#;

/// Everything the composer reads from the earlier stages
#[derive(Debug, Clone, Copy)]
pub struct ComposeInput<'a> {
    pub reference: &'a RepositoryReference,
    pub info: &'a RepositoryInfo,
    /// Resolved entry point; `None` omits the start-server step
    pub entrypoint: Option<&'a EntryPointCandidate>,
    pub plan: &'a DependencyPlan,
    pub secrets: &'a SecretSet,
}

/// Builds a [`DeploymentArtifact`] with fixed step ordering:
/// fetch, inject-secrets, install (one per plan entry), start-tunnel,
/// start-server, report-url.
#[derive(Debug, Clone)]
pub struct ArtifactComposer {
    layout: RemoteLayout,
    server_port: u16,
    min_confidence: u32,
    tunnel_token: Option<String>,
}

impl ArtifactComposer {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            layout: RemoteLayout {
                workdir: config.remote_workdir.clone(),
                state_dir: config.remote_state_dir.clone(),
            },
            server_port: config.server_port,
            min_confidence: config.min_confidence,
            tunnel_token: config.tunnel_token.clone(),
        }
    }

    /// Picks the entry point to start from ranked candidates.
    ///
    /// Only candidates with a launch command count. The best of those must
    /// reach the minimum confidence, otherwise detection is ambiguous.
    pub fn resolve_entrypoint<'c>(
        &self,
        candidates: &'c [EntryPointCandidate],
    ) -> Result<&'c EntryPointCandidate, DeploymentIssue> {
        let launchable: Vec<&EntryPointCandidate> = candidates
            .iter()
            .filter(|c| c.launch(self.server_port).is_some())
            .collect();

        match launchable.first() {
            None => Err(DeploymentIssue::DetectionAmbiguous {
                candidates: 0,
                best_confidence: None,
                min_confidence: self.min_confidence,
            }),
            Some(best) if best.confidence_score < self.min_confidence => {
                Err(DeploymentIssue::DetectionAmbiguous {
                    candidates: launchable.len(),
                    best_confidence: Some(best.confidence_score),
                    min_confidence: self.min_confidence,
                })
            }
            Some(best) => Ok(best),
        }
    }

    pub fn compose(&self, input: ComposeInput<'_>) -> DeploymentArtifact {
        let mut drafts: Vec<(StepPurpose, String, String, String, RecoveryPolicy)> = Vec::new();

        // labels carry the step index, so they are assigned once the count is known
        drafts.push(self.fetch_step(input.reference, input.info));
        drafts.push(self.secrets_step(input.secrets));
        for entry in input.plan.entries() {
            drafts.push(self.install_step(entry));
        }
        drafts.push(self.tunnel_step());
        let launch = input
            .entrypoint
            .and_then(|c| c.launch(self.server_port).map(|l| (c, l)));
        if let Some((candidate, launch)) = &launch {
            drafts.push(self.server_step(candidate, launch));
        }
        drafts.push(self.report_step(launch.as_ref().map(|(c, _)| *c)));

        let steps: Vec<DeploymentStep> = drafts
            .into_iter()
            .enumerate()
            .map(|(i, (purpose, slug, banner, body, recovery))| {
                let index = i + 1;
                let label = format!("{:02}-{}", index, slug);
                let script = if purpose.is_durable() {
                    self.layout.durable(&label, &body)
                } else {
                    self.layout.live(&label, &body)
                };
                DeploymentStep {
                    index,
                    label,
                    purpose,
                    banner,
                    script,
                    recovery,
                }
            })
            .collect();

        let digest = fingerprint(
            steps
                .iter()
                .flat_map(|s| [s.label.as_str(), s.script.as_str()]),
        );

        debug!(steps = steps.len(), repo = %input.reference, "Artifact composed");

        DeploymentArtifact {
            id: format!("nbd-{}", &digest[..16]),
            created_at: Utc::now(),
            repository: input.reference.clone(),
            commit: input.info.commit.clone(),
            entrypoint: launch.as_ref().map(|(c, _)| (*c).clone()),
            dependency_plan: input.plan.clone(),
            secret_keys: input.secrets.keys().iter().map(|k| k.to_string()).collect(),
            server_port: self.server_port,
            steps,
        }
    }

    fn fetch_step(
        &self,
        reference: &RepositoryReference,
        info: &RepositoryInfo,
    ) -> (StepPurpose, String, String, String, RecoveryPolicy) {
        let mut body = format!(
            r#"if [ -d "$NBDEPLOY_WORKDIR/.git" ]; then
  echo "Reusing checkout in $NBDEPLOY_WORKDIR"
else
  rm -rf "$NBDEPLOY_WORKDIR"
  mkdir -p "$(dirname "$NBDEPLOY_WORKDIR")"
  nbdeploy_retry {attempts} git clone --quiet --depth 1 {url} "$NBDEPLOY_WORKDIR"
fi
"#,
            attempts = FETCH_ATTEMPTS,
            url = sh_quote(&reference.clone_url()),
        );

        let banner = match &info.commit {
            Some(commit) => {
                body.push_str(&format!(
                    r#"if [ "$(git -C "$NBDEPLOY_WORKDIR" rev-parse HEAD)" != {commit} ]; then
  nbdeploy_retry {attempts} git -C "$NBDEPLOY_WORKDIR" fetch --quiet --depth 1 origin {commit}
  git -C "$NBDEPLOY_WORKDIR" checkout --quiet --force {commit}
fi
"#,
                    commit = sh_quote(commit),
                    attempts = FETCH_ATTEMPTS,
                ));
                format!(
                    "Fetch {} at commit {} into the session.",
                    reference,
                    &commit[..commit.len().min(12)]
                )
            }
            None => format!("Fetch {} (default branch) into the session.", reference),
        };
        body.push_str(&format!(
            "echo \"Checked out {} at $(git -C \"$NBDEPLOY_WORKDIR\" rev-parse --short HEAD)\"\n",
            reference.slug()
        ));

        (
            StepPurpose::Fetch,
            "fetch".to_string(),
            banner,
            body,
            RecoveryPolicy::fatal(FETCH_ATTEMPTS - 1),
        )
    }

    fn secrets_step(&self, secrets: &SecretSet) -> (StepPurpose, String, String, String, RecoveryPolicy) {
        let mut env_file = String::new();
        for (key, value) in secrets.iter() {
            env_file.push_str(&format!("export {}={}\n", key, sh_quote(value.expose())));
        }
        let keys = secrets.keys();

        let mut body = format!(
            r#"umask 077
printf '%s' {payload} | base64 -d > "$NBDEPLOY_STATE/secrets.env"
chmod 600 "$NBDEPLOY_STATE/secrets.env"
echo "secrets.env holds {count} variable(s){names}"
"#,
            payload = sh_quote(&STANDARD.encode(env_file.as_bytes())),
            count = keys.len(),
            names = if keys.is_empty() {
                String::new()
            } else {
                format!(": {}", keys.join(", "))
            },
        );

        match &self.tunnel_token {
            Some(token) => body.push_str(&format!(
                r#"printf '%s' {} | base64 -d > "$NBDEPLOY_STATE/tunnel.token"
chmod 600 "$NBDEPLOY_STATE/tunnel.token"
echo "Tunnel token stored"
"#,
                sh_quote(&STANDARD.encode(token.as_bytes()))
            )),
            None => body.push_str("rm -f \"$NBDEPLOY_STATE/tunnel.token\"\n"),
        }

        let banner = if keys.is_empty() {
            "Prepare an empty secrets file; no environment variables were supplied.".to_string()
        } else {
            format!(
                "Write {} secret(s) ({}) to secrets.env. Values travel encoded and are never printed.",
                keys.len(),
                keys.join(", ")
            )
        };

        (
            StepPurpose::InjectSecrets,
            "inject-secrets".to_string(),
            banner,
            body,
            RecoveryPolicy::fatal(0),
        )
    }

    fn install_step(&self, entry: &DependencyEntry) -> (StepPurpose, String, String, String, RecoveryPolicy) {
        let mut body = format!(
            r#"cd "$NBDEPLOY_WORKDIR"
if python -m pip install --quiet {args}; then
  echo "Installed {spec}"
"#,
            args = pip_args(&entry.package_spec),
            spec = entry.package_spec.replace('"', "'"),
        );

        if let Some(fallback) = &entry.fallback_spec {
            body.push_str(&format!(
                r#"elif python -m pip install --quiet {args}; then
  echo "{spec} failed; installed {fallback} instead"
  NBDEPLOY_RESULT=warned
"#,
                args = pip_args(fallback),
                spec = entry.package_spec.replace('"', "'"),
                fallback = fallback,
            ));
        }

        if entry.is_fatal() {
            body.push_str(&format!(
                r#"else
  echo "Install of {name} failed; the deployment cannot continue" >&2
  nbdeploy_signal failed
  exit 1
fi
"#,
                name = entry.name
            ));
        } else {
            body.push_str(&format!(
                r#"else
  echo "Install of {name} failed; continuing without it" >&2
  nbdeploy_signal failed
  exit 0
fi
"#,
                name = entry.name
            ));
        }

        let severity = if entry.is_fatal() {
            "fatal on failure"
        } else {
            "optional"
        };
        let banner = match &entry.fallback_spec {
            Some(fallback) => format!(
                "Install `{}` ({}; retried once as `{}`).",
                entry.package_spec, severity, fallback
            ),
            None => format!("Install `{}` ({}).", entry.package_spec, severity),
        };

        let recovery = RecoveryPolicy {
            retry_count: u32::from(entry.fallback_spec.is_some()),
            fatal_on_failure: entry.is_fatal(),
            fallback: entry.fallback_spec.clone(),
        };

        (
            StepPurpose::Install,
            format!("install-{}", entry.name),
            banner,
            body,
            recovery,
        )
    }

    fn tunnel_step(&self) -> (StepPurpose, String, String, String, RecoveryPolicy) {
        let body = format!(
            r#"NBDEPLOY_PORT={port}
if [ -s "$NBDEPLOY_STATE/public_url" ] && [ -f "$NBDEPLOY_STATE/tunnel.pid" ] && kill -0 "$(cat "$NBDEPLOY_STATE/tunnel.pid")" 2>/dev/null; then
  echo "Tunnel already open at $(cat "$NBDEPLOY_STATE/public_url")"
  nbdeploy_signal skipped
  exit 0
fi
python -c "import pyngrok" 2>/dev/null || nbdeploy_retry 2 python -m pip install --quiet pyngrok
cat > "$NBDEPLOY_STATE/tunnel.py" <<'NBDEPLOY_TUNNEL'
{program}NBDEPLOY_TUNNEL
nbdeploy_start_tunnel() {{
  rm -f "$NBDEPLOY_STATE/public_url"
  NBDEPLOY_STATE="$NBDEPLOY_STATE" NBDEPLOY_PORT="$NBDEPLOY_PORT" nohup python "$NBDEPLOY_STATE/tunnel.py" > "$NBDEPLOY_STATE/tunnel.log" 2>&1 < /dev/null &
  echo $! > "$NBDEPLOY_STATE/tunnel.pid"
  for _ in $(seq 1 30); do
    if [ -s "$NBDEPLOY_STATE/public_url" ]; then return 0; fi
    sleep 1
  done
  kill "$(cat "$NBDEPLOY_STATE/tunnel.pid")" 2>/dev/null || true
  return 1
}}
if ! nbdeploy_retry {attempts} nbdeploy_start_tunnel; then
  tail -n 20 "$NBDEPLOY_STATE/tunnel.log" >&2 || true
  nbdeploy_signal failed
  exit 1
fi
echo "Tunnel open at $(cat "$NBDEPLOY_STATE/public_url")"
nbdeploy_signal ok
"#,
            port = self.server_port,
            program = TUNNEL_PROGRAM,
            attempts = TUNNEL_ATTEMPTS,
        );

        let banner = format!(
            "Open a public tunnel to port {}{}.",
            self.server_port,
            if self.tunnel_token.is_some() {
                " using the configured tunnel token"
            } else {
                " (no tunnel token configured; anonymous tunnels may be refused)"
            }
        );

        (
            StepPurpose::StartTunnel,
            "start-tunnel".to_string(),
            banner,
            body,
            RecoveryPolicy::fatal(TUNNEL_ATTEMPTS - 1),
        )
    }

    fn server_step(
        &self,
        candidate: &EntryPointCandidate,
        launch: &crate::detection::LaunchSpec,
    ) -> (StepPurpose, String, String, String, RecoveryPolicy) {
        let cd = if launch.working_dir == "." {
            "cd \"$NBDEPLOY_WORKDIR\"".to_string()
        } else {
            format!("cd \"$NBDEPLOY_WORKDIR\"/{}", sh_quote(&launch.working_dir))
        };

        let body = format!(
            r#"NBDEPLOY_PORT={port}
nbdeploy_port_open() {{
  python -c "import socket, sys; s = socket.socket(); s.settimeout(1); sys.exit(0 if s.connect_ex(('127.0.0.1', int(sys.argv[1]))) == 0 else 1)" "$NBDEPLOY_PORT"
}}
if [ -f "$NBDEPLOY_STATE/server.pid" ] && kill -0 "$(cat "$NBDEPLOY_STATE/server.pid")" 2>/dev/null && nbdeploy_port_open; then
  echo "Server already listening on port $NBDEPLOY_PORT"
  nbdeploy_signal skipped
  exit 0
fi
if [ -f "$NBDEPLOY_STATE/secrets.env" ]; then
  . "$NBDEPLOY_STATE/secrets.env"
fi
python -c "import {runner}" 2>/dev/null || nbdeploy_retry 2 python -m pip install --quiet {runner}
{cd}
echo "Starting "{started}
nohup {command} > "$NBDEPLOY_STATE/server.log" 2>&1 < /dev/null &
echo $! > "$NBDEPLOY_STATE/server.pid"
for _ in $(seq 1 60); do
  if nbdeploy_port_open; then
    echo "Server listening on port $NBDEPLOY_PORT"
    nbdeploy_signal ok
    exit 0
  fi
  if ! kill -0 "$(cat "$NBDEPLOY_STATE/server.pid")" 2>/dev/null; then
    break
  fi
  sleep 1
done
echo "Server did not start; last log lines:" >&2
tail -n 30 "$NBDEPLOY_STATE/server.log" >&2 || true
nbdeploy_signal failed
exit 1
"#,
            port = self.server_port,
            runner = launch.runner_package,
            cd = cd,
            started = sh_quote(&format!(
                "{}:{}",
                path_to_slash(&candidate.file_path),
                candidate.application_symbol
            )),
            command = launch.command,
        );

        let banner = format!(
            "Start the {} application `{}` from {} on port {}.",
            candidate.framework_kind,
            candidate.application_symbol,
            path_to_slash(&candidate.file_path),
            self.server_port
        );

        (
            StepPurpose::StartServer,
            "start-server".to_string(),
            banner,
            body,
            RecoveryPolicy::fatal(0),
        )
    }

    fn report_step(
        &self,
        entrypoint: Option<&EntryPointCandidate>,
    ) -> (StepPurpose, String, String, String, RecoveryPolicy) {
        let mut body = String::from(
            r#"for _ in $(seq 1 60); do
  if [ -s "$NBDEPLOY_STATE/public_url" ]; then break; fi
  sleep 1
done
if [ ! -s "$NBDEPLOY_STATE/public_url" ]; then
  echo "No public URL is available; check the start-tunnel step" >&2
  nbdeploy_signal failed
  exit 1
fi
NBDEPLOY_PUBLIC_URL="$(cat "$NBDEPLOY_STATE/public_url")"
"#,
        );

        match entrypoint {
            Some(candidate) => {
                body.push_str(
                    r#"if python - "$NBDEPLOY_PUBLIC_URL/" <<'NBDEPLOY_PROBE'
import sys
import urllib.error
import urllib.request

try:
    urllib.request.urlopen(sys.argv[1], timeout=10)
except urllib.error.HTTPError:
    pass
NBDEPLOY_PROBE
then
  echo "Application is answering"
  NBDEPLOY_RESULT=ok
else
  echo "Application did not answer at $NBDEPLOY_PUBLIC_URL/ yet" >&2
  NBDEPLOY_RESULT=warned
fi
echo "NBDEPLOY_URL $NBDEPLOY_PUBLIC_URL"
"#,
                );
                for path in candidate.doc_paths() {
                    body.push_str(&format!("echo \"Docs: $NBDEPLOY_PUBLIC_URL{}\"\n", path));
                }
            }
            None => body.push_str(
                r#"echo "No entry point was resolved, so no server was started; run it by hand on the tunnelled port"
NBDEPLOY_RESULT=warned
echo "NBDEPLOY_URL $NBDEPLOY_PUBLIC_URL"
"#,
            ),
        }
        body.push_str("nbdeploy_signal \"$NBDEPLOY_RESULT\"\n");

        (
            StepPurpose::ReportUrl,
            "report-url".to_string(),
            "Report the public URL once the tunnel is up.".to_string(),
            body,
            RecoveryPolicy::best_effort(0),
        )
    }
}

/// Installer arguments for a spec; editable installs keep their `-e` flag
fn pip_args(spec: &str) -> String {
    let editable = spec
        .strip_prefix("-e ")
        .or_else(|| spec.strip_prefix("--editable "))
        .or_else(|| spec.strip_prefix("--editable="));
    match editable {
        Some(target) => format!("-e {}", sh_quote(target.trim())),
        None => sh_quote(spec),
    }
}
