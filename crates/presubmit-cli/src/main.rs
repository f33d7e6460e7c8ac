//! Presubmit - change verification CLI
//!
//! The `presubmit` command runs every `PRESUBMIT.rhai` script that applies to
//! a change and exits 0 when the change may proceed, 1 otherwise.
//!
//! The change is described on the command line (`--file ACTION:PATH`,
//! `--description`) or taken from the git work tree (`--from-git`).

use std::io::{self, BufRead, Cursor};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};

use presubmit_core::metadata::git::is_git_repo;
use presubmit_core::{
    do_presubmit_checks, init_tracing, write_run_report, Action, Change, EngineConfig,
    GitMetadataSource, LocalMetadataSource, MetadataSource, RunOptions, RunReport,
};

#[derive(Parser, Debug)]
#[command(name = "presubmit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run presubmit verification scripts against a change", long_about = None)]
struct Cli {
    /// Repository root (default: current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Run the commit-time checks instead of the upload-time checks
    #[arg(long)]
    commit: bool,

    /// Change name
    #[arg(long, default_value = "default")]
    change: String,

    /// Change description
    #[arg(long, conflicts_with = "description_file")]
    description: Option<String>,

    /// Read the change description from a file
    #[arg(long)]
    description_file: Option<PathBuf>,

    /// Affected entry as ACTION:PATH (e.g. M:src/lib.rs); repeatable
    #[arg(long = "file", value_name = "ACTION:PATH", value_parser = parse_file_arg)]
    files: Vec<(Action, String)>,

    /// Add the git work tree's changed entries to the change
    #[arg(long)]
    from_git: bool,

    /// Script to run when no presubmit script applies
    #[arg(long)]
    default_script: Option<PathBuf>,

    /// Configuration file (default: <root>/presubmit.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Answer yes to the warnings prompt
    #[arg(long, conflicts_with = "non_interactive")]
    assume_yes: bool,

    /// Never block on the warnings prompt; warnings then fail the run
    #[arg(long)]
    non_interactive: bool,

    /// Write a JSON run report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

/// Parse `ACTION:PATH`. The action is the status code before the first colon.
fn parse_file_arg(arg: &str) -> std::result::Result<(Action, String), String> {
    let (code, path) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected ACTION:PATH, got {arg:?}"))?;
    if code.trim().is_empty() {
        return Err(format!("missing action in {arg:?}"));
    }
    if path.is_empty() {
        return Err(format!("missing path in {arg:?}"));
    }
    Ok((Action::from_status(code), path.to_string()))
}

fn read_description(cli: &Cli) -> Result<String> {
    match (&cli.description, &cli.description_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("read description from {}", path.display())),
        (None, None) => Ok(String::new()),
    }
}

fn load_config(cli: &Cli, root: &Path) -> Result<EngineConfig> {
    match &cli.config {
        Some(path) => EngineConfig::load(path).context("load configuration"),
        None => EngineConfig::load_from_root(root).context("load configuration"),
    }
}

/// Re-express work-tree entries (relative to `top`) relative to `root`.
/// Entries outside `root` are not part of the change.
fn rebase_entries(
    entries: Vec<(String, String)>,
    top: &Path,
    root: &Path,
) -> Result<Vec<(Action, String)>> {
    let prefix = root.strip_prefix(top).with_context(|| {
        format!(
            "repository root {} is outside the git work tree {}",
            root.display(),
            top.display()
        )
    })?;
    Ok(entries
        .into_iter()
        .filter_map(|(code, path)| {
            let rel = Path::new(&path).strip_prefix(prefix).ok()?;
            if rel.as_os_str().is_empty() {
                return None;
            }
            Some((Action::from_status(&code), rel.to_string_lossy().into_owned()))
        })
        .collect())
}

fn run(cli: Cli) -> Result<bool> {
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("resolve repository root {}", cli.root.display()))?;
    if !root.is_dir() {
        bail!("repository root is not a directory: {}", root.display());
    }

    let mut files = cli.files.clone();
    let source: Rc<dyn MetadataSource> = if cli.from_git || is_git_repo(&root) {
        let git = GitMetadataSource::discover(&root).context("open git work tree")?;
        if cli.from_git {
            let changed = git.changed_entries().context("list changed entries")?;
            files.extend(rebase_entries(changed, git.root(), &root)?);
        }
        Rc::new(git)
    } else {
        Rc::new(LocalMetadataSource)
    };

    let config = load_config(&cli, &root)?;
    let mut options = RunOptions::from_config(&config, &root, cli.commit)?;
    options.verbose |= cli.verbose;
    if let Some(path) = &cli.default_script {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read default script {}", path.display()))?;
        options.default_script = Some(text);
    }

    let description = read_description(&cli)?;
    let change = Rc::new(Change::new(
        cli.change.clone(),
        description,
        &root,
        files,
        source,
    ));
    info!(change = %change.name(), entries = change.entries().len(), "checking change");

    let stdout = io::stdout();
    let mut output = stdout.lock();
    let stdin = io::stdin();
    let mut input: Box<dyn BufRead> = if cli.assume_yes {
        Box::new(Cursor::new(b"y\n".to_vec()))
    } else if cli.non_interactive {
        Box::new(io::empty())
    } else {
        Box::new(stdin.lock())
    };

    let verdict = do_presubmit_checks(change.clone(), &options, &mut output, &mut input)
        .context("run presubmit checks")?;

    if let Some(path) = &cli.report {
        let report = RunReport::from_verdict(change.name(), &verdict);
        write_run_report(path, &report)
            .with_context(|| format!("write report {}", path.display()))?;
    }
    Ok(verdict.passed)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json, level);

    Ok(if run(cli)? {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
