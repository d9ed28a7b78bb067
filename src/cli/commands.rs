use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Plans notebook deployments of Python web backends
#[derive(Parser, Debug)]
#[command(
    name = "nbdeploy",
    about = "Plans notebook deployments of Python web backends",
    version,
    author,
    long_about = "nbdeploy fetches a public repository, finds its FastAPI or Flask application \
                  without running any of its code, and writes a notebook (and shell script) \
                  that installs the dependencies, opens a tunnel and starts the server in a \
                  remote session."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Plan a deployment and write the artifact",
        long_about = "Fetches the repository, detects the entry point, plans dependency installs \
                      and composes the deployment artifact.\n\n\
                      Exit codes: 0 ready, 2 entry point ambiguous (artifact written without a \
                      start-server step), 1 anything else.\n\n\
                      Examples:\n  \
                      nbdeploy plan --repo https://github.com/octo/api --manifest requirements.txt\n  \
                      nbdeploy plan -r https://github.com/octo/api -m requirements.txt -e .env -o out/\n  \
                      nbdeploy plan -r https://github.com/octo/api -m requirements.txt --tunnel-token-env NGROK_TOKEN"
    )]
    Plan(PlanArgs),

    #[command(
        about = "Detect web application entry points in a local directory",
        long_about = "Scans a local checkout the same way planning does and prints the ranked \
                      candidates.\n\n\
                      Examples:\n  \
                      nbdeploy detect\n  \
                      nbdeploy detect /path/to/repo --format json"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Summarise the log of an artifact run",
        long_about = "Reads the signal lines an artifact run prints and reports per-step results \
                      and the public URL.\n\n\
                      Examples:\n  \
                      nbdeploy report --log run.log\n  \
                      nbdeploy report --log run.log --artifact out/artifact.json --status out/status.json"
    )]
    Report(ReportArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    #[arg(short = 'r', long, value_name = "URL", help = "Public repository URL")]
    pub repo: String,

    #[arg(
        short = 'm',
        long,
        value_name = "FILE",
        help = "Dependency manifest (requirements-style)"
    )]
    pub manifest: PathBuf,

    #[arg(short = 'e', long, value_name = "FILE", help = "Environment file with KEY=VALUE lines")]
    pub env_file: Option<PathBuf>,

    #[arg(
        short = 'o',
        long,
        value_name = "DIR",
        help = "Write notebook, script, artifact.json and status.json here"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(short = 'p', long, value_name = "PORT", help = "Port the remote server binds")]
    pub port: Option<u16>,

    #[arg(long, value_name = "SCORE", help = "Lowest entry point confidence that is started")]
    pub min_confidence: Option<u32>,

    #[arg(
        long,
        value_name = "VAR",
        help = "Read the tunnel token from this environment variable"
    )]
    pub tunnel_token_env: Option<String>,

    #[arg(long, value_name = "SECONDS", help = "Fetch timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Skip the repository visibility check")]
    pub no_visibility_check: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to repository (defaults to current directory)"
    )]
    pub repository_path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ReportArgs {
    #[arg(short = 'l', long, value_name = "FILE", help = "Captured output of an artifact run")]
    pub log: PathBuf,

    #[arg(short = 'a', long, value_name = "FILE", help = "artifact.json written by plan")]
    pub artifact: Option<PathBuf>,

    #[arg(short = 's', long, value_name = "FILE", help = "status.json written by plan")]
    pub status: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_plan_args() {
        let args = CliArgs::parse_from([
            "nbdeploy",
            "plan",
            "--repo",
            "https://github.com/octo/api",
            "--manifest",
            "requirements.txt",
        ]);
        match args.command {
            Commands::Plan(plan) => {
                assert_eq!(plan.repo, "https://github.com/octo/api");
                assert_eq!(plan.manifest, PathBuf::from("requirements.txt"));
                assert!(plan.env_file.is_none());
                assert!(plan.output_dir.is_none());
                assert_eq!(plan.format, OutputFormatArg::Human);
                assert!(plan.port.is_none());
                assert!(!plan.no_visibility_check);
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_plan_with_options() {
        let args = CliArgs::parse_from([
            "nbdeploy",
            "plan",
            "-r",
            "https://github.com/octo/api",
            "-m",
            "req.txt",
            "-e",
            ".env",
            "-o",
            "out",
            "--format",
            "json",
            "--port",
            "9000",
            "--min-confidence",
            "80",
            "--tunnel-token-env",
            "NGROK_TOKEN",
            "--timeout",
            "30",
            "--no-visibility-check",
        ]);
        match args.command {
            Commands::Plan(plan) => {
                assert_eq!(plan.env_file, Some(PathBuf::from(".env")));
                assert_eq!(plan.output_dir, Some(PathBuf::from("out")));
                assert_eq!(plan.format, OutputFormatArg::Json);
                assert_eq!(plan.port, Some(9000));
                assert_eq!(plan.min_confidence, Some(80));
                assert_eq!(plan.tunnel_token_env.as_deref(), Some("NGROK_TOKEN"));
                assert_eq!(plan.timeout, Some(30));
                assert!(plan.no_visibility_check);
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_plan_requires_repo_and_manifest() {
        assert!(CliArgs::try_parse_from(["nbdeploy", "plan"]).is_err());
        assert!(CliArgs::try_parse_from(["nbdeploy", "plan", "--repo", "x"]).is_err());
    }

    #[test]
    fn test_detect_with_path() {
        let args = CliArgs::parse_from(["nbdeploy", "detect", "/tmp/repo"]);
        match args.command {
            Commands::Detect(detect) => {
                assert_eq!(detect.repository_path, Some(PathBuf::from("/tmp/repo")));
                assert_eq!(detect.format, OutputFormatArg::Human);
            }
            _ => panic!("Expected Detect command"),
        }
    }

    #[test]
    fn test_report_args() {
        let args = CliArgs::parse_from(["nbdeploy", "report", "--log", "run.log", "-f", "yaml"]);
        match args.command {
            Commands::Report(report) => {
                assert_eq!(report.log, PathBuf::from("run.log"));
                assert!(report.artifact.is_none());
                assert!(report.status.is_none());
                assert_eq!(report.format, OutputFormatArg::Yaml);
            }
            _ => panic!("Expected Report command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["nbdeploy", "-v", "detect"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["nbdeploy", "--log-level", "debug", "detect"]);
        assert_eq!(args.log_level, Some("debug".to_string()));

        assert!(CliArgs::try_parse_from(["nbdeploy", "-v", "-q", "detect"]).is_err());
    }
}
