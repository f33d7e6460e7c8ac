//! Presubmit Core Library
//!
//! Verification engine for version-controlled changes: builds a structured
//! view of a change, discovers the `PRESUBMIT.rhai` scripts that apply to the
//! files it touches, runs them and turns their results into a verdict.

pub mod change;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fakes;
pub mod metadata;
pub mod obs;
pub mod report;
pub mod result;
pub mod runner;
pub mod sandbox;
pub mod telemetry;

pub use change::{Action, AffectedFile, Change, RightHandSideLines, Tag};
pub use config::{EngineConfig, CONFIG_FILE_NAME, DEFAULT_SCRIPT_NAME};
pub use discovery::{list_relevant_scripts, list_relevant_scripts_with};
pub use error::{PresubmitError, Result};
pub use metadata::{
    GitMetadataSource, LocalMetadataSource, MetadataError, MetadataSource, NodeInfo, NodeKind,
};
pub use obs::RunSpan;
pub use report::{read_run_report, script_digest, write_run_report, RunReport};
pub use result::{ResultItem, Severity};
pub use runner::{do_presubmit_checks, RunOptions, ScriptOutcome, Verdict};
pub use sandbox::{ScriptError, ScriptExecutor, COMMIT_ENTRY_POINT, UPLOAD_ENTRY_POINT};
pub use telemetry::init_tracing;

/// Presubmit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
