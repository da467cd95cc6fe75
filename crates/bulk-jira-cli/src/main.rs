use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use bulk_jira_core::config::Config;
use bulk_jira_core::plan::{build_plan, BuiltIssue, PlanOptions};
use bulk_jira_core::rest::JiraClient;
use bulk_jira_core::services::{BulkSubmitter, IssueState, SubmitReport};
use bulk_jira_core::spec::load_specs;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, error, info, warn};

mod logging;

#[derive(Parser, Debug)]
#[command(
    name = "bulk-jira",
    author,
    version,
    about = "Create bulk Jira tickets from a YAML file"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create every issue described in a YAML file, in file order
    Create(CreateArgs),
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Config file (default is <config dir>/bulk-jira-from-yaml/bulk-jira-from-yaml.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// YAML-formatted representation of the Jira issues to create
    #[arg(long)]
    input: PathBuf,
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
    /// Build the requests and print them as YAML without contacting Jira
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };
    let Commands::Create(args) = &cli.command;
    logging::init_logging(args.verbose);

    ExitCode::from(finish(run(cli).await))
}

/// `--help` and `--version` are successful exits; every other parse error is a failure.
fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

fn finish(result: Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err:?}");
            1
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Create(args) => create(args).await,
    }
}

async fn create(args: CreateArgs) -> Result<()> {
    let specs = load_specs(&args.input)
        .with_context(|| format!("unable to load issues from {}", args.input.display()))?;

    if args.dry_run {
        let options = dry_run_options(args.config.as_deref())?;
        let plan = build_plan(&specs, &options).context("unable to build issue requests")?;
        return render_plan(&plan);
    }

    let config = Config::load(args.config.as_deref()).context("invalid configuration")?;
    let plan = build_plan(&specs, &PlanOptions::with_label(config.label.clone()))
        .context("unable to build issue requests")?;
    if plan.is_empty() {
        warn!("{} contains no issues; nothing to create", args.input.display());
        return Ok(());
    }

    info!("connecting to {}", config.host);
    let client = JiraClient::new(&config).context("failed to build Jira client")?;
    let submitter = BulkSubmitter::new(client);
    submitter
        .preflight(&plan)
        .await
        .context("preflight checks failed")?;

    match submitter.submit(&plan).await {
        Ok(report) => {
            render_report(&report);
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err.report() {
                let created = report.created_keys();
                if !created.is_empty() {
                    error!(
                        "run aborted; already created and not rolled back: {}",
                        created.join(", ")
                    );
                }
            }
            Err(err).context("issue submission failed")
        }
    }
}

/// Credentials are not needed for a dry run, only the label. A config file named
/// on the command line must still load; the default one may be absent or incomplete.
fn dry_run_options(config: Option<&Path>) -> Result<PlanOptions> {
    if config.is_some() {
        let config = Config::load(config).context("invalid configuration")?;
        return Ok(PlanOptions::with_label(config.label));
    }
    Ok(match Config::load(None) {
        Ok(config) => PlanOptions::with_label(config.label),
        Err(err) => {
            debug!("dry run without configuration: {err}");
            PlanOptions::default()
        }
    })
}

fn render_plan(plan: &[BuiltIssue]) -> Result<()> {
    for issue in plan {
        println!("---");
        print!("{}", serde_yaml::to_string(issue)?);
    }
    Ok(())
}

fn render_report(report: &SubmitReport) {
    for outcome in &report.issues {
        match &outcome.state {
            IssueState::Submitted { key, .. } => {
                println!("{:<6} {:<12} {}", outcome.spec_id, key, outcome.summary)
            }
            IssueState::Built | IssueState::Failed => {
                println!("{:<6} {:<12} {}", outcome.spec_id, "-", outcome.summary)
            }
        }
    }
    println!(
        "Created {} issue(s) and {} link(s).",
        report.created_keys().len(),
        report.links_created
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use httpmock::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn create_args(input: PathBuf, config: Option<PathBuf>, dry_run: bool) -> CreateArgs {
        CreateArgs {
            config,
            input,
            verbose: false,
            dry_run,
        }
    }

    const ONE_ISSUE: &str = r#"
- spec_id: 1
  fields: { summary: Revoke VPN access, project: { key: OPS } }
"#;

    #[test]
    fn parses_create_flags() {
        let cli = Cli::try_parse_from([
            "bulk-jira",
            "create",
            "--config",
            "conf.yaml",
            "--input",
            "issues.yaml",
            "-v",
        ])
        .unwrap();
        let Commands::Create(args) = cli.command;
        assert_eq!(args.config, Some(PathBuf::from("conf.yaml")));
        assert_eq!(args.input, PathBuf::from("issues.yaml"));
        assert!(args.verbose);
        assert!(!args.dry_run);
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["bulk-jira", "create"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn help_and_version_exit_successfully() {
        for flag in ["--help", "--version"] {
            let err = Cli::try_parse_from(["bulk-jira", flag]).unwrap_err();
            assert!(matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ));
            assert_eq!(usage_exit_code(&err), 0, "{flag}");
        }
    }

    #[test]
    fn usage_errors_exit_with_failure() {
        let err = Cli::try_parse_from(["bulk-jira", "create", "--input", "x.yaml", "--bogus"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert_eq!(usage_exit_code(&err), 1);

        let err = Cli::try_parse_from(["bulk-jira", "create"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), 1);
    }

    #[test]
    fn dry_run_rejects_missing_explicit_config() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        let err = dry_run_options(Some(&missing)).unwrap_err();
        assert!(format!("{err:?}").contains("missing.yaml"), "{err:?}");
    }

    #[test]
    fn dry_run_uses_label_from_explicit_config() {
        let dir = TempDir::new().unwrap();
        let config = write(
            &dir,
            "config.yaml",
            "host: https://example.atlassian.net\nusername: ada\ntoken: t\nlabel: leavers\n",
        );
        let options = dry_run_options(Some(&config)).unwrap();
        assert_eq!(options.label, "leavers");
    }

    #[tokio::test]
    async fn dry_run_with_bad_config_fails_the_command() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "issues.yaml", ONE_ISSUE);
        let config = write(&dir, "config.yaml", "host: not a url\nusername: ada\ntoken: t\n");

        let result = create(create_args(input, Some(config), true)).await;
        assert!(result.is_err());
        assert_eq!(finish(result), 1);
    }

    #[tokio::test]
    async fn empty_input_succeeds_without_contacting_jira() {
        let server = MockServer::start();
        let any = server.mock(|when, then| {
            when.path_contains("/rest/api/2/");
            then.status(500);
        });
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "issues.yaml", "");
        let config = write(
            &dir,
            "config.yaml",
            &format!("host: {}\nusername: ada\ntoken: t\n", server.base_url()),
        );

        let result = create(create_args(input, Some(config), false)).await;
        assert_eq!(finish(result), 0);
        any.assert_hits(0);
    }

    #[tokio::test]
    async fn rejected_issue_exits_with_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/myself");
            then.status(200).body(r#"{"accountId":"abc","displayName":"Ada"}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/project/OPS");
            then.status(200).body(r#"{"id":"1","key":"OPS"}"#);
        });
        let create_mock = server.mock(|when, then| {
            when.method(POST).path("/rest/api/2/issue");
            then.status(400).body(r#"{"errors":{"summary":"too long"}}"#);
        });
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "issues.yaml", ONE_ISSUE);
        let config = write(
            &dir,
            "config.yaml",
            &format!("host: {}\nusername: ada\ntoken: t\n", server.base_url()),
        );

        let result = create(create_args(input, Some(config), false)).await;
        create_mock.assert_hits(1);
        assert_eq!(finish(result), 1);
    }
}
