//! Crate-level error taxonomy for the presubmit engine.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::metadata::MetadataError;
use crate::sandbox::ScriptError;

/// Errors produced by the presubmit engine.
///
/// Per-script faults never surface here: the runner converts them into
/// reportable results. What remains are failures of the run itself.
#[derive(Debug, thiserror::Error)]
pub enum PresubmitError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("failed to read default script {}: {source}", path.display())]
    DefaultScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for presubmit engine operations.
pub type Result<T> = std::result::Result<T, PresubmitError>;
