//! Filesystem-only metadata source with no backing store.

use std::path::Path;

use super::{MetadataError, MetadataResult, MetadataSource, NodeInfo};

/// Answers existence and content questions from the local filesystem. The
/// backing store is empty: no server identity, no properties, no base revision.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMetadataSource;

impl MetadataSource for LocalMetadataSource {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn info(&self, _path: &Path) -> MetadataResult<NodeInfo> {
        Ok(NodeInfo::default())
    }

    fn property(&self, _path: &Path, _name: &str) -> MetadataResult<Option<String>> {
        Ok(None)
    }

    fn read_file(&self, path: &Path) -> MetadataResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn read_base_file(&self, path: &Path) -> MetadataResult<String> {
        Err(MetadataError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no base revision for {}", path.display()),
        )))
    }
}
