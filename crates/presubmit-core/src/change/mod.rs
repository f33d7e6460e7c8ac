//! The change under verification.
//!
//! - [`affected_file`]: `AffectedFile` + `Action`, lazily cached metadata
//! - [`tags`]: `KEY=value` tag lines in the description
//! - [`path`]: lexical normalization of caller-supplied paths

pub mod affected_file;
pub mod path;
pub mod tags;

use std::cell::{Cell, OnceCell};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::metadata::MetadataSource;

pub use affected_file::{Action, AffectedFile};
pub use tags::{parse_description, ParsedDescription, Tag};

/// A change: identifier, free-text description and the ordered entries it
/// touches. Entry order is the caller's order and is kept by every view.
pub struct Change {
    name: String,
    description: String,
    root: PathBuf,
    entries: Vec<AffectedFile>,
    source: Rc<dyn MetadataSource>,
    parsed: OnceCell<ParsedDescription>,
    deprecation_warned: Cell<bool>,
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Change")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Change {
    /// Build a change from `(action, path)` pairs. Paths are relative to `root`.
    pub fn new<I, S>(
        name: impl Into<String>,
        description: impl Into<String>,
        root: impl Into<PathBuf>,
        files: I,
        source: Rc<dyn MetadataSource>,
    ) -> Self
    where
        I: IntoIterator<Item = (Action, S)>,
        S: Into<String>,
    {
        let root = root.into();
        let entries = files
            .into_iter()
            .map(|(action, path)| AffectedFile::new(path, action, &root, source.clone()))
            .collect();
        Self {
            name: name.into(),
            description: description.into(),
            root,
            entries,
            source,
            parsed: OnceCell::new(),
            deprecation_warned: Cell::new(false),
        }
    }

    /// Change identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Repository root the entries are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All entries in input order, directories and deletions included.
    pub fn entries(&self) -> &[AffectedFile] {
        &self.entries
    }

    fn parsed(&self) -> &ParsedDescription {
        self.parsed
            .get_or_init(|| parse_description(&self.description))
    }

    /// The description exactly as supplied.
    pub fn full_description_text(&self) -> &str {
        &self.description
    }

    /// The description without tag lines, trailing whitespace trimmed.
    pub fn description_text(&self) -> &str {
        &self.parsed().prose
    }

    /// Tags parsed from the description.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.parsed().tags
    }

    /// Look up a tag by exact key. Unknown keys yield [`Tag::Absent`].
    pub fn tag(&self, key: &str) -> Tag<'_> {
        match self.tags().get(key) {
            Some(value) => Tag::Value(value),
            None => Tag::Absent,
        }
    }

    /// Entries filtered by kind. `affected_files(false, true)` is the usual
    /// view: no directories, deletions included.
    pub fn affected_files(&self, include_dirs: bool, include_deletes: bool) -> Vec<&AffectedFile> {
        filter_files(self.entries.iter(), include_dirs, include_deletes)
    }

    /// Affected text files.
    pub fn text_files(&self, include_deletes: bool) -> Vec<&AffectedFile> {
        self.affected_files(false, include_deletes)
            .into_iter()
            .filter(|f| f.is_text_file())
            .collect()
    }

    /// Affected text files; logs a deprecation warning the first time it is
    /// called on this change.
    #[deprecated(note = "use `Change::text_files`")]
    pub fn affected_text_files(&self, include_deletes: bool) -> Vec<&AffectedFile> {
        self.warn_deprecated("affected_text_files", "text_files");
        self.text_files(include_deletes)
    }

    /// Whether a deprecated accessor has been used on this change.
    pub fn deprecation_warned(&self) -> bool {
        self.deprecation_warned.get()
    }

    pub(crate) fn warn_deprecated(&self, name: &str, replacement: &str) {
        if !self.deprecation_warned.replace(true) {
            tracing::warn!(
                event = "presubmit.deprecated",
                accessor = name,
                replacement = replacement,
                "deprecated accessor used"
            );
        }
    }

    /// Every line of every non-deleted text file, in entry order, with
    /// 1-based line numbers. Each call starts a fresh pass.
    pub fn right_hand_side_lines(&self) -> RightHandSideLines<'_> {
        RightHandSideLines::new(self.entries.iter().collect())
    }

    /// Normalized local paths of the filtered entries.
    pub fn local_paths(&self, include_dirs: bool, include_deletes: bool) -> Vec<&str> {
        self.affected_files(include_dirs, include_deletes)
            .into_iter()
            .map(AffectedFile::local_path)
            .collect()
    }

    /// Absolute local paths of the filtered entries.
    pub fn absolute_local_paths(&self, include_dirs: bool, include_deletes: bool) -> Vec<&Path> {
        self.affected_files(include_dirs, include_deletes)
            .into_iter()
            .map(AffectedFile::absolute_local_path)
            .collect()
    }

    /// Server paths of the filtered entries; unknown entries yield `""`.
    pub fn server_paths(&self, include_dirs: bool, include_deletes: bool) -> Vec<&str> {
        self.affected_files(include_dirs, include_deletes)
            .into_iter()
            .map(AffectedFile::server_path)
            .collect()
    }

    /// Server identity of a local path (relative to the root, or absolute).
    /// `None` when the backing store does not know the path.
    pub fn local_to_depot_path(&self, local_path: &str) -> Option<String> {
        let local = path::normalize(local_path);
        let absolute = self.root.join(local);
        match self.source.info(&absolute) {
            Ok(info) => info.url,
            Err(err) => {
                debug!(path = %absolute.display(), error = %err, "no server identity");
                None
            }
        }
    }

    /// Local path a server identity maps to, if the backing store knows it.
    pub fn depot_to_local_path(&self, url: &str) -> Option<PathBuf> {
        match self.source.info(Path::new(url)) {
            Ok(info) => info.local_path,
            Err(err) => {
                debug!(url, error = %err, "no local path");
                None
            }
        }
    }
}

/// Whether an entry passes the directory/deletion filters.
pub fn is_selected(file: &AffectedFile, include_dirs: bool, include_deletes: bool) -> bool {
    (include_dirs || !file.is_directory()) && (include_deletes || !file.is_deleted())
}

/// Apply the directory/deletion filters to a sequence of entries.
pub fn filter_files<'a>(
    files: impl Iterator<Item = &'a AffectedFile>,
    include_dirs: bool,
    include_deletes: bool,
) -> Vec<&'a AffectedFile> {
    files
        .filter(|f| is_selected(f, include_dirs, include_deletes))
        .collect()
}

/// Position of a right-hand-side walk over an ordered list of entries.
///
/// Deleted and non-text entries are skipped; contents are read only when the
/// walk reaches an entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCursor {
    file: usize,
    line: usize,
}

impl LineCursor {
    /// Step to the next line. `entry` maps a list position to its entry and
    /// returns `None` past the end. Yields `(position, line_number, line)`
    /// with 1-based line numbers.
    pub fn next_line<'a>(
        &mut self,
        entry: impl Fn(usize) -> Option<&'a AffectedFile>,
    ) -> Option<(usize, usize, &'a str)> {
        loop {
            let file = entry(self.file)?;
            if self.line == 0 && (file.is_deleted() || !file.is_text_file()) {
                self.file += 1;
                continue;
            }
            if let Some(text) = file.new_contents().get(self.line) {
                self.line += 1;
                return Some((self.file, self.line, text.as_str()));
            }
            self.file += 1;
            self.line = 0;
        }
    }
}

/// Lazy iterator over `(entry, line_number, line)` for the text files among a
/// set of entries.
#[derive(Debug, Clone)]
pub struct RightHandSideLines<'a> {
    files: Vec<&'a AffectedFile>,
    cursor: LineCursor,
}

impl<'a> RightHandSideLines<'a> {
    /// Iterate over the given entries; deleted and non-text entries are skipped.
    pub fn new(files: Vec<&'a AffectedFile>) -> Self {
        Self {
            files,
            cursor: LineCursor::default(),
        }
    }
}

impl<'a> Iterator for RightHandSideLines<'a> {
    type Item = (&'a AffectedFile, usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let files = &self.files;
        let (position, line, text) = self.cursor.next_line(|i| files.get(i).copied())?;
        Some((files[position], line, text))
    }
}
