use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use diffscope_core::{ChangeSet, DiffScopeConfig, DiffTool, OutputFormat, ReportStrategy};
use diffscope_difflens::filter::{FilterResult, PathFilter};
use diffscope_difflens::DiffScope;
use diffscope_git::GitRepository;
use diffscope_report::github::{GitHubClient, PublishTarget, PullRequestRef};
use diffscope_report::{ReportComment, ViolationKind};

#[derive(Parser)]
#[command(
    name = "diffscope",
    version,
    about = "Scope static-analysis findings to the lines a pull request changed",
    long_about = "Computes, per file, the line numbers added or removed between two refs and\n\
                   filters scanner findings down to those lines before posting them to GitHub.\n\n\
                   Examples:\n  \
                     diffscope lines main feature                    Changed lines between origin branches\n  \
                     diffscope lines main                            Working tree against origin/main\n  \
                     diffscope lines main topic --remote-url URL     Compare against a fork\n  \
                     diffscope report --scan scan.json main feature  Findings on changed lines"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .diffscope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listing (default)\n  \
                         json      Machine-readable JSON\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(clap::Args)]
struct ScopeArgs {
    /// Base ref, then optionally the target ref (branch names without remote)
    refs: Vec<String>,

    /// Repository path (default: current directory)
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// URL of the repository holding the target ref (e.g. a fork)
    #[arg(long)]
    remote_url: Option<String>,

    /// Fetch the origin remote before diffing
    #[arg(long)]
    fetch: bool,

    /// Keep lock files, vendored code and configured skip patterns
    #[arg(long)]
    all_files: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the changed line numbers per file
    #[command(long_about = "Print the changed line numbers per file.\n\n\
        With two refs, diffs origin/<base> against <remote>/<target>, where <remote> is\n\
        the destination remote when --remote-url is given and origin otherwise.\n\
        With one ref, diffs origin/<ref> against the working tree. With none, prints\n\
        an empty result.\n\n\
        Examples:\n  diffscope lines main feature\n  diffscope lines main topic --remote-url https://github.com/fork/repo.git")]
    Lines {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Filter scanner findings to changed lines and optionally post them
    #[command(long_about = "Filter scanner findings to changed lines and optionally post them.\n\n\
        Reads scanner JSON, keeps findings whose line range touches a changed line, and\n\
        prints them. With --post, publishes them to GitHub using the configured strategy.\n\
        Exits with status 1 if any finding is at or below the severity threshold.\n\n\
        Examples:\n  diffscope report --scan scan.json main feature\n  \
        diffscope report --scan scan.json --pr owner/repo#12 --post main feature")]
    Report {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Scanner results JSON file
        #[arg(long)]
        scan: PathBuf,

        /// Pull request (owner/repo#number)
        #[arg(long)]
        pr: Option<String>,

        /// Commit to attach comments to (default: HEAD)
        #[arg(long)]
        sha: Option<String>,

        /// Posting strategy: review, commit or check (default from config)
        #[arg(long)]
        strategy: Option<ReportStrategy>,

        /// Publish findings to GitHub
        #[arg(long)]
        post: bool,

        /// Severities at or below this value fail the run (default from config)
        #[arg(long)]
        severity_threshold: Option<u8>,

        /// GitHub token (default: GITHUB_TOKEN env var)
        #[arg(long)]
        github_token: Option<String>,
    },
    /// Create a default .diffscope.toml configuration file
    #[command(long_about = "Create a default .diffscope.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .diffscope.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

const DEFAULT_CONFIG: &str = r#"# diffscope configuration

[git]
# origin_remote = "origin"
# destination_remote = "destination"
# detect_renames = true
# context_lines = 3

[scope]
# skip_patterns = ["*.min.js", "fixtures/**"]
# skip_extensions = ["snap"]
# skip_defaults = true

[report]
# strategy = "review"
# severity_threshold = 4
# check_name = "diffscope"
"#;

fn init_logging(verbose: bool, use_color: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("DIFFSCOPE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(use_color)
                .with_target(false),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DiffScopeConfig> {
    match path {
        Some(path) => Ok(DiffScopeConfig::from_file(path)?),
        None => {
            let default_path = Path::new(".diffscope.toml");
            if default_path.exists() {
                Ok(DiffScopeConfig::from_file(default_path)?)
            } else {
                Ok(DiffScopeConfig::default())
            }
        }
    }
}

/// Open the repository, compute the change set and apply the path filter.
fn compute_scope(args: &ScopeArgs, config: &DiffScopeConfig) -> Result<(GitRepository, ChangeSet)> {
    let repo = GitRepository::open(&args.repo)?.with_config(&config.git);

    let spinner = if std::io::stderr().is_terminal()
        && (args.fetch || args.remote_url.is_some())
    {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .into_diagnostic()?,
        );
        pb.set_message("Fetching remotes...");
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = (|| -> Result<ChangeSet> {
        if args.fetch {
            repo.update_remote(&config.git.origin_remote)?;
        }
        Ok(DiffScope::new(&repo, &config.git)
            .changed_lines(&args.refs, args.remote_url.as_deref())?)
    })();

    if let Some(pb) = spinner {
        match &result {
            Ok(_) => pb.finish_and_clear(),
            Err(_) => pb.finish_with_message("Failed"),
        }
    }
    let changes = result?;

    if args.all_files {
        return Ok((repo, changes));
    }
    let FilterResult { kept, skipped } = PathFilter::from_config(&config.scope).filter(changes);
    for file in &skipped {
        tracing::info!(path = %file.path.display(), reason = %file.reason, "skipped file");
    }
    Ok((repo, kept))
}

fn print_changes(changes: &ChangeSet, format: OutputFormat) -> Result<()> {
    let sorted = changes.to_sorted();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&sorted).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if sorted.is_empty() {
                println!("No changed lines.");
                return Ok(());
            }
            println!("| File | Changed lines |");
            println!("| --- | --- |");
            for (path, lines) in &sorted {
                println!("| `{path}` | {} |", join_lines(lines));
            }
        }
        OutputFormat::Text => {
            for (path, lines) in &sorted {
                println!("{path}: {}", join_lines(lines));
            }
        }
    }
    Ok(())
}

fn join_lines<'a>(lines: impl IntoIterator<Item = &'a u32>) -> String {
    lines
        .into_iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn print_comments(comments: &[ReportComment], format: OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(comments).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("{}\n", diffscope_report::comment::summarize(comments));
            for c in comments {
                println!("- `{}:{}-{}` {}", c.path, c.start_line, c.end_line, c.body);
            }
        }
        OutputFormat::Text => {
            for c in comments {
                let label = match (c.kind, use_color) {
                    (ViolationKind::Error, true) => "\x1b[31merror\x1b[0m",
                    (ViolationKind::Warning, true) => "\x1b[33mwarning\x1b[0m",
                    (ViolationKind::Error, false) => "error",
                    (ViolationKind::Warning, false) => "warning",
                };
                println!(
                    "{}:{}-{} {label} [{}] {}",
                    c.path, c.start_line, c.end_line, c.rule, c.body
                );
            }
            eprintln!("{}", diffscope_report::comment::summarize(comments));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };
    init_logging(cli.verbose, use_color);

    match cli.command {
        Command::Lines { ref scope } => {
            let config = load_config(cli.config.as_deref())?;
            let (_repo, changes) = compute_scope(scope, &config)?;
            print_changes(&changes, cli.format)?;
        }
        Command::Report {
            ref scope,
            ref scan,
            ref pr,
            ref sha,
            strategy,
            post,
            severity_threshold,
            ref github_token,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let threshold = severity_threshold.unwrap_or(config.report.severity_threshold);
            let strategy = strategy.unwrap_or(config.report.strategy);

            let results = diffscope_report::load_scan_results(scan)?;
            let (repo, changes) = compute_scope(scope, &config)?;
            let scoped = diffscope_report::scope_violations(&results, &changes, repo.root());
            let comments = diffscope_report::build_comments(&scoped, threshold);

            print_comments(&comments, cli.format, use_color)?;

            if post {
                let Some(pr) = pr else {
                    miette::bail!("--post requires --pr owner/repo#number");
                };
                let pr: PullRequestRef = pr.parse()?;
                let sha = match sha {
                    Some(sha) => sha.clone(),
                    None => repo.head_sha()?,
                };
                let target = PublishTarget {
                    owner: pr.owner,
                    repo: pr.repo,
                    pr: Some(pr.number),
                    sha,
                };
                let client = GitHubClient::new(github_token.as_deref())?;
                client
                    .publish(&target, strategy, &config.report.check_name, &comments)
                    .await?;
                eprintln!(
                    "Posted {} finding(s) using the {strategy} strategy",
                    comments.len()
                );
            }

            if diffscope_report::has_halting_error(&comments) {
                std::process::exit(1);
            }
        }
        Command::Init => {
            let path = Path::new(".diffscope.toml");
            if path.exists() {
                miette::bail!(".diffscope.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .diffscope.toml with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "diffscope", &mut std::io::stdout());
        }
    }

    Ok(())
}
