//! JSON run report written after a verification run.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;
use crate::result::ResultItem;
use crate::runner::{ScriptOutcome, Verdict};

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Hex SHA-256 digest of a script's source text.
pub fn script_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Persisted record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: String,
    pub run_id: Uuid,
    pub change: String,
    pub committing: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub passed: bool,
    pub prompted: bool,
    pub results: Vec<ResultItem>,
    pub scripts: Vec<ScriptOutcome>,
}

impl RunReport {
    pub fn from_verdict(change: &str, verdict: &Verdict) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id: verdict.run_id,
            change: change.to_string(),
            committing: verdict.committing,
            started_at: verdict.started_at,
            finished_at: verdict.finished_at,
            passed: verdict.passed,
            prompted: verdict.prompted,
            results: verdict.results.clone(),
            scripts: verdict.scripts.clone(),
        }
    }
}

/// Write the report as pretty JSON.
pub fn write_run_report(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Read a report written by [`write_run_report`].
pub fn read_run_report(path: &Path) -> Result<RunReport> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
