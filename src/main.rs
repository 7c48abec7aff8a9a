use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covtrack::baseline::{BaselineManager, DEFAULT_MAX_LOOKBACK, DEFAULT_PRECISION};
use covtrack::cli::{self, Output, Style};
use covtrack::config::{self, Settings};
use covtrack::diff::{DiffSource, GitDiff, GitHubDiff, StdinDiff};
use covtrack::git::ProcessGit;
use covtrack::notes::NotesStore;
use covtrack::report::{MarkdownFormatter, TextFormatter};
use covtrack::retry::DEFAULT_MAX_RETRIES;
use covtrack::{github, ingest};

/// covtrack: pull request coverage annotations and commit-addressed
/// coverage baselines stored in git notes.
#[derive(Parser)]
#[command(name = "covtrack", version, about)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Repository to operate on.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SettingsArgs {
    /// Tracking stream; notes live under refs/notes/<namespace>.
    #[arg(
        long,
        global = true,
        env = "COVTRACK_NAMESPACE",
        default_value = config::DEFAULT_NAMESPACE,
        value_parser = config::validate_namespace
    )]
    namespace: String,

    /// Branch pull requests merge into.
    #[arg(long, global = true, env = "COVTRACK_TARGET_BRANCH", default_value = config::DEFAULT_TARGET_BRANCH)]
    target_branch: String,

    /// Remote the notes are shared through.
    #[arg(long, global = true, env = "COVTRACK_REMOTE", default_value = config::DEFAULT_REMOTE)]
    remote: String,

    /// Ancestors of the merge-base to search for a baseline.
    #[arg(long, global = true, env = "COVTRACK_MAX_LOOKBACK", default_value_t = DEFAULT_MAX_LOOKBACK)]
    max_lookback: usize,

    /// Push retries when the remote notes ref moved.
    #[arg(long, global = true, env = "COVTRACK_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Decimals in the coverage delta.
    #[arg(long, global = true, env = "COVTRACK_PRECISION", default_value_t = DEFAULT_PRECISION)]
    precision: usize,

    /// Snapshots shown in the trend.
    #[arg(long = "history", global = true, env = "COVTRACK_HISTORY", default_value_t = config::DEFAULT_HISTORY_LEN)]
    history_len: usize,
}

impl From<SettingsArgs> for Settings {
    fn from(args: SettingsArgs) -> Self {
        Settings {
            namespace: args.namespace,
            target_branch: args.target_branch,
            remote: args.remote,
            max_lookback: args.max_lookback,
            max_retries: args.max_retries,
            precision: args.precision,
            history_len: args.history_len,
        }
    }
}

#[derive(Args)]
struct DiffArgs {
    /// Git diff arguments, e.g. "origin/main...HEAD".
    #[arg(long, conflicts_with = "github")]
    git_diff: Option<String>,

    /// Fetch the diff from the current GitHub pull request (uses
    /// GITHUB_TOKEN, GITHUB_REPOSITORY, GITHUB_REF).
    #[arg(long)]
    github: bool,

    /// Prefix prepended to diff paths to match coverage paths.
    #[arg(long)]
    path_prefix: Option<String>,
}

impl DiffArgs {
    fn source(&self) -> Result<Option<Box<dyn DiffSource>>> {
        if self.github {
            return Ok(Some(Box::new(GitHubDiff::from_env()?)));
        }
        Ok(self
            .git_diff
            .clone()
            .map(|args| Box::new(GitDiff { args }) as Box<dyn DiffSource>))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate uncovered lines added by a diff. Reads the diff from stdin
    /// unless --git-diff or --github is given.
    Annotate {
        /// Path to the coverage file.
        coverage: PathBuf,

        /// Override format detection (cobertura, lcov).
        #[arg(long)]
        format: Option<String>,

        #[command(flatten)]
        diff: DiffArgs,

        #[arg(long, value_enum, default_value = "text")]
        output: Output,
    },

    /// Record a coverage snapshot for a commit and push it.
    Store {
        /// Path to the coverage file.
        coverage: PathBuf,

        /// Override format detection (cobertura, lcov).
        #[arg(long)]
        format: Option<String>,

        /// Commit to attach the snapshot to.
        #[arg(long, default_value = "HEAD")]
        commit: String,
    },

    /// Compare coverage with the target branch baseline and annotate the diff.
    Check {
        /// Path to the coverage file.
        coverage: PathBuf,

        /// Override format detection (cobertura, lcov).
        #[arg(long)]
        format: Option<String>,

        #[command(flatten)]
        diff: DiffArgs,

        #[arg(long, value_enum, default_value = "text")]
        style: Style,

        /// Create or update a comment on the GitHub pull request.
        #[arg(long)]
        comment: bool,
    },

    /// Show the snapshot recorded for a commit.
    Show {
        #[arg(long, default_value = "HEAD")]
        commit: String,
    },

    /// Show recorded coverage for a commit and its ancestors.
    History {
        #[arg(long, default_value = "HEAD")]
        commit: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("COVTRACK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let settings = Settings::from(cli.settings);
    let store = NotesStore::new(ProcessGit::new(&cli.repo), settings.remote.clone());
    let mut manager = BaselineManager::new(store);

    match cli.command {
        Commands::Annotate {
            coverage,
            format,
            diff,
            output,
        } => {
            let (data, _) = ingest::load_coverage(&coverage, format.as_deref())
                .with_context(|| format!("Failed to load {}", coverage.display()))?;
            let source = diff.source()?.unwrap_or_else(|| Box::new(StdinDiff) as Box<dyn DiffSource>);
            let diff_text = source.fetch_diff()?;
            cli::cmd_annotate(&data, &diff_text, diff.path_prefix.as_deref(), &output)
        }
        Commands::Store {
            coverage,
            format,
            commit,
        } => {
            let (data, _) = ingest::load_coverage(&coverage, format.as_deref())
                .with_context(|| format!("Failed to load {}", coverage.display()))?;
            cli::cmd_store(&mut manager, &settings, &data, &commit, chrono::Utc::now())
        }
        Commands::Check {
            coverage,
            format,
            diff,
            style,
            comment,
        } => {
            let (data, _) = ingest::load_coverage(&coverage, format.as_deref())
                .with_context(|| format!("Failed to load {}", coverage.display()))?;
            let source = diff.source()?;
            let diff_text = source.as_ref().map(|s| s.fetch_diff()).transpose()?;
            let sha = source.as_ref().and_then(|s| s.sha()).map(str::to_owned);

            let report = cli::check_report(
                &manager,
                &settings,
                &data,
                diff_text.as_deref(),
                diff.path_prefix.as_deref(),
                sha,
            )?;
            if comment {
                github::Context::from_env()?.post_comment(&report.format(&MarkdownFormatter))?;
            }
            Ok(match style {
                Style::Text => report.format(&TextFormatter),
                Style::Markdown => report.format(&MarkdownFormatter),
            })
        }
        Commands::Show { commit } => cli::cmd_show(&manager, &settings, &commit),
        Commands::History { commit } => cli::cmd_history(&manager, &settings, &commit),
    }
}
