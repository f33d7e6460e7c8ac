//! In-memory metadata source (testing only).
//!
//! `MemoryMetadataSource` answers from maps populated by the test and counts
//! every query, so cache-coherency properties can be asserted directly.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::metadata::{MetadataError, MetadataResult, MetadataSource, NodeInfo, NodeKind};

/// Which query a call counter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Exists,
    IsDir,
    Info,
    Property,
    ReadFile,
    ReadBaseFile,
}

/// In-memory metadata source keyed by path.
#[derive(Debug, Default)]
pub struct MemoryMetadataSource {
    local_files: HashMap<PathBuf, String>,
    local_dirs: HashSet<PathBuf>,
    base_files: HashMap<PathBuf, String>,
    infos: HashMap<PathBuf, NodeInfo>,
    properties: HashMap<(PathBuf, String), String>,
    calls: RefCell<HashMap<(Query, PathBuf), usize>>,
}

impl MemoryMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A file present in the working copy.
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.local_files.insert(path.into(), contents.to_string());
        self
    }

    /// A directory present in the working copy.
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_dirs.insert(path.into());
        self
    }

    /// Base-revision text of a file.
    pub fn with_base_file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.base_files.insert(path.into(), contents.to_string());
        self
    }

    /// Server URL and kind recorded by the backing store.
    pub fn with_tracked(mut self, path: impl Into<PathBuf>, url: &str, kind: NodeKind) -> Self {
        let path = path.into();
        self.infos.insert(
            path.clone(),
            NodeInfo {
                url: Some(url.to_string()),
                kind: Some(kind),
                local_path: Some(path),
            },
        );
        self
    }

    /// A named property on a path.
    pub fn with_property(mut self, path: impl Into<PathBuf>, name: &str, value: &str) -> Self {
        self.properties
            .insert((path.into(), name.to_string()), value.to_string());
        self
    }

    /// Number of times `query` was issued for `path`.
    pub fn calls(&self, query: Query, path: impl AsRef<Path>) -> usize {
        self.calls
            .borrow()
            .get(&(query, path.as_ref().to_path_buf()))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of queries of any kind.
    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    fn record(&self, query: Query, path: &Path) {
        *self
            .calls
            .borrow_mut()
            .entry((query, path.to_path_buf()))
            .or_insert(0) += 1;
    }
}

impl MetadataSource for MemoryMetadataSource {
    fn exists(&self, path: &Path) -> bool {
        self.record(Query::Exists, path);
        self.local_files.contains_key(path) || self.local_dirs.contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.record(Query::IsDir, path);
        self.local_dirs.contains(path)
    }

    fn info(&self, path: &Path) -> MetadataResult<NodeInfo> {
        self.record(Query::Info, path);
        if let Some(info) = self.infos.get(path) {
            return Ok(info.clone());
        }
        // Server URLs resolve back to the local path they were registered for.
        let by_url = self
            .infos
            .values()
            .find(|info| info.url.as_deref().map(Path::new) == Some(path));
        Ok(by_url.cloned().unwrap_or_default())
    }

    fn property(&self, path: &Path, name: &str) -> MetadataResult<Option<String>> {
        self.record(Query::Property, path);
        Ok(self
            .properties
            .get(&(path.to_path_buf(), name.to_string()))
            .cloned())
    }

    fn read_file(&self, path: &Path) -> MetadataResult<String> {
        self.record(Query::ReadFile, path);
        self.local_files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn read_base_file(&self, path: &Path) -> MetadataResult<String> {
        self.record(Query::ReadBaseFile, path);
        self.base_files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> MetadataError {
    MetadataError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_queries_per_path() {
        let source = MemoryMetadataSource::new().with_file("/repo/a.txt", "x");
        assert!(source.exists(Path::new("/repo/a.txt")));
        assert!(source.exists(Path::new("/repo/a.txt")));
        assert!(!source.exists(Path::new("/repo/b.txt")));
        assert_eq!(source.calls(Query::Exists, "/repo/a.txt"), 2);
        assert_eq!(source.calls(Query::Exists, "/repo/b.txt"), 1);
        assert_eq!(source.total_calls(), 3);
    }

    #[test]
    fn test_info_resolves_urls() {
        let source =
            MemoryMetadataSource::new().with_tracked("/repo/a.txt", "svn:/repo/a.txt", NodeKind::File);
        let info = source.info(Path::new("svn:/repo/a.txt")).unwrap();
        assert_eq!(info.local_path, Some(PathBuf::from("/repo/a.txt")));
    }
}
