//! One file or directory touched by a change.
//!
//! Every metadata answer is resolved at most once per entry and then served
//! from [`FileMetadata`]. Metadata faults resolve to "no information" and are
//! cached like any other answer.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::path::normalize;
use crate::metadata::{MetadataSource, NodeInfo, MIME_TYPE_PROPERTY};

/// What the change does to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Added,
    Modified,
    Deleted,
    Unversioned,
    Replaced,
    Other(String),
}

impl Action {
    /// Parse a status code; only the first non-blank character is significant
    /// (`"A  +"` is an addition with history).
    pub fn from_status(code: &str) -> Self {
        match code.trim().chars().next() {
            Some('A') => Action::Added,
            Some('M') => Action::Modified,
            Some('D') => Action::Deleted,
            Some('?') => Action::Unversioned,
            Some('R') => Action::Replaced,
            _ => Action::Other(code.trim().to_string()),
        }
    }

    /// Single-letter status code.
    pub fn code(&self) -> &str {
        match self {
            Action::Added => "A",
            Action::Modified => "M",
            Action::Deleted => "D",
            Action::Unversioned => "?",
            Action::Replaced => "R",
            Action::Other(code) => code,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Lazily resolved metadata. Each cell is either unresolved or holds the
/// final answer.
#[derive(Debug, Default)]
struct FileMetadata {
    exists: OnceCell<bool>,
    is_directory: OnceCell<bool>,
    info: OnceCell<NodeInfo>,
    is_text: OnceCell<bool>,
    properties: RefCell<HashMap<String, Option<String>>>,
    new_contents: OnceCell<Vec<String>>,
    old_contents: OnceCell<Vec<String>>,
}

/// A file or directory touched by a change.
pub struct AffectedFile {
    path: String,
    local_path: String,
    absolute_path: PathBuf,
    action: Action,
    source: Rc<dyn MetadataSource>,
    meta: FileMetadata,
}

impl fmt::Debug for AffectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffectedFile")
            .field("local_path", &self.local_path)
            .field("action", &self.action)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl AffectedFile {
    /// Create an entry for `path` (as supplied by the caller) under `root`.
    pub fn new(
        path: impl Into<String>,
        action: Action,
        root: &Path,
        source: Rc<dyn MetadataSource>,
    ) -> Self {
        let path = path.into();
        let local_path = normalize(&path);
        let absolute_path = if Path::new(&local_path).is_absolute() {
            PathBuf::from(&local_path)
        } else {
            root.join(&local_path)
        };
        Self {
            path,
            local_path,
            absolute_path,
            action,
            source,
            meta: FileMetadata::default(),
        }
    }

    /// The path exactly as the caller supplied it.
    pub fn raw_path(&self) -> &str {
        &self.path
    }

    /// Normalized path relative to the repository root.
    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    /// Repository root joined with the local path.
    pub fn absolute_local_path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn is_deleted(&self) -> bool {
        self.action == Action::Deleted
    }

    /// Whether the entry exists in the working copy.
    pub fn exists(&self) -> bool {
        *self
            .meta
            .exists
            .get_or_init(|| self.source.exists(&self.absolute_path))
    }

    /// Whether the entry is a directory. Entries missing locally (deletions)
    /// fall back to the node kind recorded by the backing store.
    pub fn is_directory(&self) -> bool {
        *self.meta.is_directory.get_or_init(|| {
            if self.exists() {
                self.source.is_dir(&self.absolute_path)
            } else {
                self.info().is_directory()
            }
        })
    }

    /// Backing-store record for the entry.
    pub fn info(&self) -> &NodeInfo {
        self.meta.info.get_or_init(|| {
            self.source
                .info(&self.absolute_path)
                .unwrap_or_else(|err| {
                    debug!(path = %self.local_path, error = %err, "no server info");
                    NodeInfo::default()
                })
        })
    }

    /// Server-side identity, empty when the backing store does not know the
    /// entry (never committed, or unresolvable).
    pub fn server_path(&self) -> &str {
        self.info().url.as_deref().unwrap_or("")
    }

    /// Named property; each distinct name is queried at most once.
    pub fn property(&self, name: &str) -> Option<String> {
        if let Some(cached) = self.meta.properties.borrow().get(name) {
            return cached.clone();
        }
        let value = self
            .source
            .property(&self.absolute_path, name)
            .unwrap_or_else(|err| {
                debug!(path = %self.local_path, property = name, error = %err, "property lookup failed");
                None
            });
        self.meta
            .properties
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        value
    }

    /// Deletions and directories are never text. Otherwise a file is text
    /// unless its MIME type is set to something outside `text/`.
    pub fn is_text_file(&self) -> bool {
        *self.meta.is_text.get_or_init(|| {
            if self.is_deleted() || self.is_directory() {
                return false;
            }
            match self.property(MIME_TYPE_PROPERTY) {
                None => true,
                Some(mime) => mime.is_empty() || mime.starts_with("text/"),
            }
        })
    }

    /// Working-copy lines, line endings stripped. Empty for deletions.
    pub fn new_contents(&self) -> &[String] {
        self.meta.new_contents.get_or_init(|| {
            if self.is_deleted() {
                return Vec::new();
            }
            match self.source.read_file(&self.absolute_path) {
                Ok(text) => split_lines(&text),
                Err(err) => {
                    debug!(path = %self.local_path, error = %err, "cannot read new contents");
                    Vec::new()
                }
            }
        })
    }

    /// Base-revision lines, line endings stripped. Empty for new files.
    pub fn old_contents(&self) -> &[String] {
        self.meta.old_contents.get_or_init(|| {
            match self.source.read_base_file(&self.absolute_path) {
                Ok(text) => split_lines(&text),
                Err(err) => {
                    debug!(path = %self.local_path, error = %err, "cannot read old contents");
                    Vec::new()
                }
            }
        })
    }

    /// Write the base revision to a temporary file. The file is removed when
    /// the returned path is dropped.
    pub fn old_file_temp_path(&self) -> std::io::Result<tempfile::TempPath> {
        let mut file = tempfile::NamedTempFile::new()?;
        for line in self.old_contents() {
            writeln!(file, "{line}")?;
        }
        file.flush()?;
        Ok(file.into_temp_path())
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryMetadataSource, Query};
    use crate::metadata::NodeKind;

    fn entry(source: &Rc<MemoryMetadataSource>, path: &str, action: Action) -> AffectedFile {
        AffectedFile::new(path, action, Path::new("/repo"), source.clone())
    }

    #[test]
    fn test_action_from_status() {
        assert_eq!(Action::from_status("A"), Action::Added);
        assert_eq!(Action::from_status("A  +"), Action::Added);
        assert_eq!(Action::from_status(" M"), Action::Modified);
        assert_eq!(Action::from_status("?"), Action::Unversioned);
        assert_eq!(Action::from_status("!"), Action::Other("!".to_string()));
        assert_eq!(Action::Deleted.to_string(), "D");
    }

    #[test]
    fn test_paths() {
        let source = Rc::new(MemoryMetadataSource::new());
        let af = entry(&source, "foo\\blat.cc", Action::Modified);
        assert_eq!(af.raw_path(), "foo\\blat.cc");
        assert_eq!(Path::new(af.local_path()), Path::new("foo").join("blat.cc"));
        assert_eq!(af.absolute_local_path(), Path::new("/repo/foo/blat.cc"));
    }

    #[test]
    fn test_property_is_cached() {
        let source = Rc::new(
            MemoryMetadataSource::new().with_property("/repo/foo.cc", "secret", "value"),
        );
        let af = entry(&source, "foo.cc", Action::Added);
        assert_eq!(af.property("secret").as_deref(), Some("value"));
        assert_eq!(af.property("secret").as_deref(), Some("value"));
        assert_eq!(af.property("other"), None);
        assert_eq!(af.property("other"), None);
        assert_eq!(source.calls(Query::Property, "/repo/foo.cc"), 2);
    }

    #[test]
    fn test_is_directory_not_exists() {
        let source = Rc::new(MemoryMetadataSource::new());
        let af = entry(&source, "foo.cc", Action::Added);
        assert!(!af.is_directory());
        assert!(!af.is_directory());
        assert_eq!(source.calls(Query::Exists, "/repo/foo.cc"), 1);
        assert_eq!(source.calls(Query::Info, "/repo/foo.cc"), 1);
        assert_eq!(source.calls(Query::IsDir, "/repo/foo.cc"), 0);
    }

    #[test]
    fn test_is_directory_exists() {
        let source = Rc::new(MemoryMetadataSource::new().with_dir("/repo/foo"));
        let af = entry(&source, "foo", Action::Added);
        assert!(af.is_directory());
        assert!(af.is_directory());
        assert_eq!(source.calls(Query::IsDir, "/repo/foo"), 1);
        assert_eq!(source.calls(Query::Info, "/repo/foo"), 0);
    }

    #[test]
    fn test_deleted_directory_uses_store_kind() {
        let source = Rc::new(MemoryMetadataSource::new().with_tracked(
            "/repo/gone",
            "svn:/repo/gone",
            NodeKind::Directory,
        ));
        let af = entry(&source, "gone", Action::Deleted);
        assert!(af.is_directory());
    }

    #[test]
    fn test_missing_file_known_to_store() {
        let source = Rc::new(MemoryMetadataSource::new().with_tracked(
            "/repo/boo/flap.h",
            "svn:/foo/boo/flap.h",
            NodeKind::File,
        ));
        let af = entry(&source, "boo/flap.h", Action::Deleted);
        assert!(!af.is_directory());
        assert_eq!(af.server_path(), "svn:/foo/boo/flap.h");
        // One store lookup serves both questions.
        assert_eq!(source.calls(Query::Info, "/repo/boo/flap.h"), 1);
    }

    #[test]
    fn test_unknown_file_has_empty_server_path() {
        let source = Rc::new(MemoryMetadataSource::new());
        let af = entry(&source, "notfound.cc", Action::Added);
        assert_eq!(af.server_path(), "");
    }

    #[test]
    fn test_is_text_file() {
        let source = Rc::new(
            MemoryMetadataSource::new()
                .with_file("/repo/foo/blat.txt", "")
                .with_file("/repo/foo/binary.blob", "")
                .with_file("/repo/foo/empty_mime.txt", "")
                .with_file("/repo/foo/page.html", "")
                .with_property("/repo/foo/binary.blob", MIME_TYPE_PROPERTY, "application/octet-stream")
                .with_property("/repo/foo/empty_mime.txt", MIME_TYPE_PROPERTY, "")
                .with_property("/repo/foo/page.html", MIME_TYPE_PROPERTY, "text/html"),
        );
        assert!(entry(&source, "foo/blat.txt", Action::Modified).is_text_file());
        assert!(!entry(&source, "foo/binary.blob", Action::Modified).is_text_file());
        assert!(entry(&source, "foo/empty_mime.txt", Action::Modified).is_text_file());
        assert!(entry(&source, "foo/page.html", Action::Modified).is_text_file());

        let deleted = entry(&source, "blat/flop.txt", Action::Deleted);
        assert!(!deleted.is_text_file());
        assert_eq!(source.calls(Query::Property, "/repo/blat/flop.txt"), 0);
    }

    #[test]
    fn test_contents_read_once() {
        let source = Rc::new(
            MemoryMetadataSource::new()
                .with_file("/repo/foo/blat.cc", "whatever\r\ncookie")
                .with_base_file("/repo/foo/blat.cc", "old\n"),
        );
        let af = entry(&source, "foo/blat.cc", Action::Modified);
        assert_eq!(af.new_contents(), ["whatever", "cookie"]);
        assert_eq!(af.new_contents(), ["whatever", "cookie"]);
        assert_eq!(af.old_contents(), ["old"]);
        assert_eq!(source.calls(Query::ReadFile, "/repo/foo/blat.cc"), 1);
        assert_eq!(source.calls(Query::ReadBaseFile, "/repo/foo/blat.cc"), 1);
    }

    #[test]
    fn test_deleted_new_contents_are_empty() {
        let source = Rc::new(MemoryMetadataSource::new().with_base_file("/repo/gone.cc", "x\n"));
        let af = entry(&source, "gone.cc", Action::Deleted);
        assert!(af.new_contents().is_empty());
        assert_eq!(af.old_contents(), ["x"]);
        assert_eq!(source.calls(Query::ReadFile, "/repo/gone.cc"), 0);
    }

    #[test]
    fn test_old_file_temp_path() {
        let source = Rc::new(MemoryMetadataSource::new().with_base_file("/repo/a.txt", "one\ntwo"));
        let af = entry(&source, "a.txt", Action::Modified);
        let path = af.old_file_temp_path().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }
}
