//! Error types for the sandbox module.

use std::path::{Path, PathBuf};

/// Errors produced while executing one verification script.
///
/// The runner converts every variant into a result attributed to the script;
/// none of them aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("{} failed to compile: {message}", path.display())]
    Compile { path: PathBuf, message: String },

    #[error("{} raised an error in {entry_point}: {message}", path.display())]
    Runtime {
        path: PathBuf,
        entry_point: String,
        message: String,
    },

    #[error(
        "{} returned {found} from {entry_point}; expected an array of results or nothing",
        path.display()
    )]
    InvalidReturn {
        path: PathBuf,
        entry_point: String,
        found: String,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScriptError {
    /// Location of the script the error is attributed to.
    pub fn path(&self) -> &Path {
        match self {
            ScriptError::Compile { path, .. }
            | ScriptError::Runtime { path, .. }
            | ScriptError::InvalidReturn { path, .. }
            | ScriptError::Read { path, .. } => path,
        }
    }

    /// The script ran but broke the return-value contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, ScriptError::InvalidReturn { .. })
    }
}

/// Result type for sandbox operations.
pub type ScriptResult<T> = std::result::Result<T, ScriptError>;
