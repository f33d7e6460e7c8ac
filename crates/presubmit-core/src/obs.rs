//! Structured lifecycle events for verification runs.
//!
//! Every event carries an `event` field so log pipelines can filter on it.

use std::path::Path;

use tracing::{error, info, warn};

/// RAII guard that enters a run-scoped span for the duration of a run.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id and change name.
    pub fn enter(run_id: &str, change: &str) -> Self {
        let span = tracing::info_span!("presubmit.run", run_id = %run_id, change = %change);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: run started.
pub fn emit_run_started(committing: bool, affected: usize) {
    info!(event = "presubmit.run_started", committing = committing, affected = affected);
}

/// Emit event: a script is about to execute.
pub fn emit_script_started(location: &Path) {
    info!(event = "presubmit.script_started", script = %location.display());
}

/// Emit event: a script completed and honoured the return contract.
pub fn emit_script_finished(location: &Path, results: usize, duration_ms: u64) {
    info!(
        event = "presubmit.script_finished",
        script = %location.display(),
        results = results,
        duration_ms = duration_ms,
    );
}

/// Emit event: a script faulted or violated the return contract.
pub fn emit_script_fault(location: &Path, err: &dyn std::fmt::Display) {
    error!(event = "presubmit.script_fault", script = %location.display(), error = %err);
}

/// Emit event: discovery found no script.
pub fn emit_no_script_found(has_default: bool) {
    warn!(event = "presubmit.no_script_found", has_default = has_default);
}

/// Emit event: final verdict.
pub fn emit_verdict(passed: bool, fatal: usize, warnings: usize, notices: usize) {
    info!(
        event = "presubmit.verdict",
        passed = passed,
        fatal = fatal,
        warnings = warnings,
        notices = notices,
    );
}
