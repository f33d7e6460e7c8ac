//! The verification run: discover scripts, execute them in order, partition
//! their results by severity and decide.
//!
//! ```text
//! Discover -> ExecuteAll -> Partition -> Pass
//!                                     -> Fail            (any fatal result)
//!                                     -> PromptOperator  (warnings only) -> Pass | Fail
//! ```

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::change::{AffectedFile, Change};
use crate::config::{EngineConfig, DEFAULT_SCRIPT_NAME};
use crate::discovery::list_relevant_scripts;
use crate::error::{PresubmitError, Result};
use crate::obs::{self, RunSpan};
use crate::report::script_digest;
use crate::result::{confirm, ResultItem, Severity};
use crate::sandbox::{ScriptError, ScriptExecutor};

pub const MESSAGES_HEADER: &str = "** Presubmit Messages **";
pub const WARNINGS_HEADER: &str = "** Presubmit Warnings **";
pub const ERRORS_HEADER: &str = "** Presubmit ERRORS **";
pub const CONTINUE_QUESTION: &str =
    "There were presubmit warnings. Are you sure you wish to continue?";

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Commit-time run (`check_change_on_commit`) rather than upload-time.
    pub committing: bool,
    pub verbose: bool,
    /// Script file name probed in every ancestor directory.
    pub script_name: String,
    /// Source text run when discovery finds no script.
    pub default_script: Option<String>,
    /// Operation budget per script (0 = unlimited).
    pub max_operations: u64,
    pub script_faults_are_fatal: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            committing: false,
            verbose: false,
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
            default_script: None,
            max_operations: 0,
            script_faults_are_fatal: false,
        }
    }
}

impl RunOptions {
    /// Options from configuration. The default script path is resolved
    /// against `root` and read immediately.
    pub fn from_config(config: &EngineConfig, root: &Path, committing: bool) -> Result<Self> {
        let default_script = match &config.default_script {
            Some(path) => {
                let path = root.join(path);
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| PresubmitError::DefaultScript { path, source })?;
                Some(text)
            }
            None => None,
        };
        Ok(Self {
            committing,
            verbose: config.verbose,
            script_name: config.script_name.clone(),
            default_script,
            max_operations: config.max_operations,
            script_faults_are_fatal: config.script_faults_are_fatal,
        })
    }
}

/// What happened to one executed script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    pub location: PathBuf,
    /// The caller-supplied default script rather than a discovered one.
    pub is_default: bool,
    /// SHA-256 of the executed source text.
    pub digest: String,
    /// Number of results the script returned.
    pub results: usize,
    /// Fault or contract violation, if the script did not complete cleanly.
    pub fault: Option<String>,
    pub duration_ms: u64,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub run_id: Uuid,
    pub committing: bool,
    pub passed: bool,
    /// Every result in execution order.
    pub results: Vec<ResultItem>,
    pub scripts: Vec<ScriptOutcome>,
    /// Whether the operator was asked to confirm.
    pub prompted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Verdict {
    /// Results of one severity, in execution order.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ResultItem> {
        self.results.iter().filter(move |r| r.severity == severity)
    }
}

struct PlannedScript {
    location: PathBuf,
    text: std::result::Result<String, ScriptError>,
    is_default: bool,
}

fn plan(change: &Change, options: &RunOptions, output: &mut dyn Write) -> Result<Vec<PlannedScript>> {
    let root = change.root();
    let discovered = list_relevant_scripts(
        change.entries().iter().map(AffectedFile::local_path),
        root,
        &options.script_name,
    );

    if discovered.is_empty() {
        obs::emit_no_script_found(options.default_script.is_some());
        if options.verbose {
            writeln!(output, "Warning, no presubmit script found.")?;
        }
        let Some(text) = &options.default_script else {
            return Ok(Vec::new());
        };
        if options.verbose {
            writeln!(output, "Running default presubmit script.")?;
        }
        return Ok(vec![PlannedScript {
            location: root.join(&options.script_name),
            text: Ok(text.clone()),
            is_default: true,
        }]);
    }

    Ok(discovered
        .into_iter()
        .map(|location| {
            let text = std::fs::read_to_string(&location).map_err(|source| ScriptError::Read {
                path: location.clone(),
                source,
            });
            PlannedScript {
                location,
                text,
                is_default: false,
            }
        })
        .collect())
}

/// Turn a per-script failure into a result attributed to that script.
fn fault_result(err: &ScriptError, options: &RunOptions) -> ResultItem {
    let message = err.to_string();
    if err.is_contract_violation() || options.script_faults_are_fatal {
        ResultItem::error(message)
    } else {
        ResultItem::notify(message)
    }
}

fn partition(results: &[ResultItem], severity: Severity) -> Vec<&ResultItem> {
    results.iter().filter(|r| r.severity == severity).collect()
}

fn print_section(output: &mut dyn Write, header: &str, results: &[&ResultItem]) -> Result<()> {
    if results.is_empty() {
        return Ok(());
    }
    writeln!(output, "{header}")?;
    for result in results {
        result.print(output)?;
        writeln!(output)?;
    }
    Ok(())
}

/// Run every applicable script against `change` and decide.
///
/// Results are printed to `output`; when only warnings block the change the
/// operator is asked on `output` and one line is read from `input`.
pub fn do_presubmit_checks(
    change: Rc<Change>,
    options: &RunOptions,
    output: &mut dyn Write,
    input: &mut dyn BufRead,
) -> Result<Verdict> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let _span = RunSpan::enter(&run_id.to_string(), change.name());
    obs::emit_run_started(options.committing, change.entries().len());

    // Discover
    let planned = plan(&change, options, output)?;

    // ExecuteAll
    let executor = ScriptExecutor::new(change.clone(), options.committing, options.max_operations);
    let mut results = Vec::new();
    let mut scripts = Vec::with_capacity(planned.len());
    for script in planned {
        if options.verbose && !script.is_default {
            writeln!(output, "Running {}", script.location.display())?;
        }
        obs::emit_script_started(&script.location);
        let start = Instant::now();
        let digest = script
            .text
            .as_deref()
            .map(script_digest)
            .unwrap_or_default();
        let outcome = script
            .text
            .and_then(|text| executor.execute(&text, &script.location));
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (count, fault) = match outcome {
            Ok(items) => {
                obs::emit_script_finished(&script.location, items.len(), duration_ms);
                let count = items.len();
                results.extend(items);
                (count, None)
            }
            Err(err) => {
                obs::emit_script_fault(&script.location, &err);
                results.push(fault_result(&err, options));
                (0, Some(err.to_string()))
            }
        };
        scripts.push(ScriptOutcome {
            location: script.location,
            is_default: script.is_default,
            digest,
            results: count,
            fault,
            duration_ms,
        });
    }

    // Partition
    let errors = partition(&results, Severity::Fatal);
    let warnings = partition(&results, Severity::PromptWarning);
    let notices = partition(&results, Severity::Notify);

    print_section(output, MESSAGES_HEADER, &notices)?;
    print_section(output, WARNINGS_HEADER, &warnings)?;
    print_section(output, ERRORS_HEADER, &errors)?;

    // Decide
    let mut prompted = false;
    let passed = if !errors.is_empty() {
        false
    } else if !warnings.is_empty() {
        prompted = true;
        confirm(output, input, CONTINUE_QUESTION)?
    } else {
        true
    };
    output.flush()?;

    obs::emit_verdict(passed, errors.len(), warnings.len(), notices.len());
    Ok(Verdict {
        run_id,
        committing: options.committing,
        passed,
        results,
        scripts,
        prompted,
        started_at,
        finished_at: Utc::now(),
    })
}
