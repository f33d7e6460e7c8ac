//! Metadata sources: the narrow query interface to the version-control backend.
//!
//! The engine never mutates the backend. It asks four kinds of questions:
//! local existence and kind, server-side identity, named properties, and file
//! contents (working copy and base revision).
//!
//! - [`git`]: `GitMetadataSource`, shells out to `git`
//! - [`local`]: `LocalMetadataSource`, plain filesystem with no backing store

pub mod git;
pub mod local;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use git::GitMetadataSource;
pub use local::LocalMetadataSource;

/// Property holding a file's MIME type. Files whose MIME type is set and does
/// not start with `text/` are binary.
pub const MIME_TYPE_PROPERTY: &str = "mime-type";

/// Errors raised by a metadata source.
///
/// Consumers in the change model treat these as "no information available".
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("path {} is outside the repository root", .0.display())]
    OutsideRoot(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for metadata queries.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Kind of node the backing store records for a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Directory,
    Other(String),
}

/// What the backing store knows about a path. Every field is optional: an
/// untracked path yields `NodeInfo::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Server-side identity (repository URL of the node).
    pub url: Option<String>,
    /// Node kind as recorded by the backing store.
    pub kind: Option<NodeKind>,
    /// Local path the node maps to.
    pub local_path: Option<PathBuf>,
}

impl NodeInfo {
    /// Whether the store records the node as a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, Some(NodeKind::Directory))
    }
}

/// Query interface to the version-control backend.
///
/// Implementations must be side-effect free. Paths passed by the change model
/// are absolute local paths.
pub trait MetadataSource {
    /// Whether the path exists in the working copy.
    fn exists(&self, path: &Path) -> bool;

    /// Whether the path is a directory in the working copy.
    fn is_dir(&self, path: &Path) -> bool;

    /// Server-side identity and kind of a local path, or of a server URL.
    fn info(&self, path: &Path) -> MetadataResult<NodeInfo>;

    /// Value of a named property, `None` when unset.
    fn property(&self, path: &Path, name: &str) -> MetadataResult<Option<String>>;

    /// Working-copy text of a file.
    fn read_file(&self, path: &Path) -> MetadataResult<String>;

    /// Text of a file at the base revision the change is made against.
    fn read_base_file(&self, path: &Path) -> MetadataResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_info_default_is_not_directory() {
        assert!(!NodeInfo::default().is_directory());
    }

    #[test]
    fn test_node_info_directory_kind() {
        let info = NodeInfo {
            kind: Some(NodeKind::Directory),
            ..NodeInfo::default()
        };
        assert!(info.is_directory());
    }

    #[test]
    fn test_node_kind_serde_names() {
        let json = serde_json::to_string(&NodeKind::Directory).unwrap();
        assert_eq!(json, "\"directory\"");
    }
}
