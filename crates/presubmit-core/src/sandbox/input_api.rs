//! The `input` object handed to verification scripts, and the handles it
//! gives out.
//!
//! Handles are cheap `Rc` clones of the change plus an entry index, so every
//! script sees the same lazily cached metadata.

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use globset::Glob;
use regex::Regex;
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Map, INT};
use tempfile::TempPath;

use crate::change::{is_selected, AffectedFile, Change, LineCursor};

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// Entry indices of `change` that pass the filters, optionally restricted to
/// entries located under `scope`.
fn select(
    change: &Change,
    scope: Option<&Path>,
    include_dirs: bool,
    include_deletes: bool,
) -> Vec<usize> {
    change
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, f)| scope.map_or(true, |dir| f.absolute_local_path().starts_with(dir)))
        .filter(|(_, f)| is_selected(f, include_dirs, include_deletes))
        .map(|(i, _)| i)
        .collect()
}

fn select_text(change: &Change, scope: Option<&Path>, include_deletes: bool) -> Vec<usize> {
    select(change, scope, false, include_deletes)
        .into_iter()
        .filter(|&i| change.entries()[i].is_text_file())
        .collect()
}

fn string_array<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Array {
    items
        .into_iter()
        .map(|s| Dynamic::from(Into::<String>::into(s)))
        .collect()
}

fn optional_string(value: Option<String>) -> Dynamic {
    value.map_or(Dynamic::UNIT, Dynamic::from)
}

/// Script-side handle to one affected entry.
#[derive(Debug, Clone)]
pub struct FileHandle {
    change: Rc<Change>,
    index: usize,
}

impl FileHandle {
    pub fn file(&self) -> &AffectedFile {
        &self.change.entries()[self.index]
    }
}

fn handles(change: &Rc<Change>, indices: Vec<usize>) -> Array {
    indices
        .into_iter()
        .map(|index| {
            Dynamic::from(FileHandle {
                change: change.clone(),
                index,
            })
        })
        .collect()
}

/// Lazy `[file, line_number, text]` sequence over the non-deleted text files
/// among a set of entries. Iterating a value twice starts over.
#[derive(Debug, Clone)]
pub struct RhsLines {
    change: Rc<Change>,
    indices: Vec<usize>,
}

impl IntoIterator for RhsLines {
    type Item = Array;
    type IntoIter = RhsLinesIter;

    fn into_iter(self) -> RhsLinesIter {
        RhsLinesIter {
            change: self.change,
            indices: self.indices,
            cursor: LineCursor::default(),
        }
    }
}

#[derive(Debug)]
pub struct RhsLinesIter {
    change: Rc<Change>,
    indices: Vec<usize>,
    cursor: LineCursor,
}

impl Iterator for RhsLinesIter {
    type Item = Array;

    fn next(&mut self) -> Option<Array> {
        let entries = self.change.entries();
        let indices = &self.indices;
        let (position, line, text) = self
            .cursor
            .next_line(|i| indices.get(i).map(|&index| &entries[index]))?;
        let handle = FileHandle {
            change: self.change.clone(),
            index: indices[position],
        };
        Some(vec![
            Dynamic::from(handle),
            Dynamic::from(line as INT),
            Dynamic::from(text.to_string()),
        ])
    }
}

/// Script-side handle to the change (`input.change`).
#[derive(Debug, Clone)]
pub struct ChangeHandle {
    change: Rc<Change>,
}

impl ChangeHandle {
    /// Tag value, or `()` when the description has no such tag.
    fn tag(&self, key: &str) -> Dynamic {
        self.change
            .tag(key)
            .value()
            .map_or(Dynamic::UNIT, |v| Dynamic::from(v.to_string()))
    }

    fn tags(&self) -> Map {
        self.change
            .tags()
            .iter()
            .map(|(k, v)| (k.as_str().into(), Dynamic::from(v.clone())))
            .collect()
    }

    fn affected_files(&self, include_dirs: bool, include_deletes: bool) -> Array {
        handles(
            &self.change,
            select(&self.change, None, include_dirs, include_deletes),
        )
    }

    fn text_files(&self, include_deletes: bool) -> Array {
        handles(&self.change, select_text(&self.change, None, include_deletes))
    }

    fn affected_text_files(&self, include_deletes: bool) -> Array {
        self.change
            .warn_deprecated("affected_text_files", "text_files");
        self.text_files(include_deletes)
    }

    fn right_hand_side_lines(&self) -> RhsLines {
        RhsLines {
            change: self.change.clone(),
            indices: (0..self.change.entries().len()).collect(),
        }
    }
}

/// The `input` object: the change, the running script's directory and a
/// small set of host utilities. File views are restricted to entries under
/// the script's directory.
#[derive(Debug, Clone)]
pub struct InputApi {
    change: Rc<Change>,
    script_dir: PathBuf,
    committing: bool,
    temp_files: Rc<RefCell<Vec<TempPath>>>,
}

impl InputApi {
    /// `temp_files` keeps temporary files alive until the run drops it.
    pub fn new(
        change: Rc<Change>,
        script_dir: impl Into<PathBuf>,
        committing: bool,
        temp_files: Rc<RefCell<Vec<TempPath>>>,
    ) -> Self {
        Self {
            change,
            script_dir: script_dir.into(),
            committing,
            temp_files,
        }
    }

    pub fn change(&self) -> &Change {
        &self.change
    }

    /// Directory of the running script.
    pub fn presubmit_local_path(&self) -> &Path {
        &self.script_dir
    }

    pub fn is_committing(&self) -> bool {
        self.committing
    }

    /// Entries under the script's directory that pass the filters.
    pub fn affected_files(&self, include_dirs: bool, include_deletes: bool) -> Vec<&AffectedFile> {
        self.indices(include_dirs, include_deletes)
            .into_iter()
            .map(|i| &self.change.entries()[i])
            .collect()
    }

    fn indices(&self, include_dirs: bool, include_deletes: bool) -> Vec<usize> {
        select(
            &self.change,
            Some(&self.script_dir),
            include_dirs,
            include_deletes,
        )
    }

    fn file_handles(&self, include_dirs: bool, include_deletes: bool) -> Array {
        handles(&self.change, self.indices(include_dirs, include_deletes))
    }

    fn text_file_handles(&self, include_deletes: bool) -> Array {
        handles(
            &self.change,
            select_text(&self.change, Some(&self.script_dir), include_deletes),
        )
    }

    fn right_hand_side_lines(&self) -> RhsLines {
        RhsLines {
            change: self.change.clone(),
            indices: self.indices(false, false),
        }
    }

    fn local_paths(&self, include_dirs: bool) -> Array {
        string_array(
            self.affected_files(include_dirs, true)
                .into_iter()
                .map(AffectedFile::local_path),
        )
    }

    fn absolute_local_paths(&self, include_dirs: bool) -> Array {
        string_array(
            self.affected_files(include_dirs, true)
                .into_iter()
                .map(|f| f.absolute_local_path().to_string_lossy().into_owned()),
        )
    }

    fn server_paths(&self, include_dirs: bool) -> Array {
        string_array(
            self.affected_files(include_dirs, true)
                .into_iter()
                .map(AffectedFile::server_path),
        )
    }

    /// Run a command in the script's directory and capture its output.
    fn run_command(&self, argv: Array) -> RhaiResult<Map> {
        let argv = argv
            .into_iter()
            .map(|arg| arg.into_immutable_string().map(|s| s.to_string()))
            .collect::<Result<Vec<String>, _>>()
            .map_err(|found| format!("run_command: arguments must be strings, found {found}"))?;
        let Some((program, args)) = argv.split_first() else {
            return Err("run_command: empty command".into());
        };
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.script_dir)
            .output()
            .map_err(|e| format!("run_command {program}: {e}"))?;

        let mut result = Map::new();
        result.insert(
            "status".into(),
            Dynamic::from(output.status.code().map_or(-1, INT::from)),
        );
        result.insert(
            "stdout".into(),
            Dynamic::from(String::from_utf8_lossy(&output.stdout).into_owned()),
        );
        result.insert(
            "stderr".into(),
            Dynamic::from(String::from_utf8_lossy(&output.stderr).into_owned()),
        );
        Ok(result)
    }

    fn keep_temp(&self, path: TempPath) -> String {
        let display = path.to_string_lossy().into_owned();
        self.temp_files.borrow_mut().push(path);
        display
    }

    /// Write `contents` to a temporary file that lives until the run ends.
    fn temp_file(&self, contents: &str) -> RhaiResult<String> {
        let write = || -> std::io::Result<TempPath> {
            let mut file = tempfile::NamedTempFile::new()?;
            file.write_all(contents.as_bytes())?;
            file.flush()?;
            Ok(file.into_temp_path())
        };
        let path = write().map_err(|e| format!("temp_file: {e}"))?;
        Ok(self.keep_temp(path))
    }

    fn old_file_temp_path(&self, file: &FileHandle) -> RhaiResult<String> {
        let path = file
            .file()
            .old_file_temp_path()
            .map_err(|e| format!("old_file_temp_path {}: {e}", file.file().local_path()))?;
        Ok(self.keep_temp(path))
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn dirname(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn join_path(parts: &[&str]) -> String {
    let joined: PathBuf = parts.iter().collect();
    joined.to_string_lossy().into_owned()
}

fn compile(pattern: &str) -> RhaiResult<Regex> {
    Regex::new(pattern).map_err(|e| format!("invalid pattern {pattern:?}: {e}").into())
}

/// Shell-style match of the whole of `name`; `*` also crosses `/`.
fn fnmatch(pattern: &str, name: &str) -> RhaiResult<bool> {
    let matcher = Glob::new(pattern)
        .map_err(|err| format!("invalid glob {pattern:?}: {err}"))?
        .compile_matcher();
    Ok(matcher.is_match(name))
}

/// Whether `pattern` matches at the start of `text`.
fn re_match(pattern: &str, text: &str) -> RhaiResult<bool> {
    Ok(compile(&format!("^(?:{pattern})"))?.is_match(text))
}

/// Every non-overlapping match of `pattern` in `text`.
fn re_find(pattern: &str, text: &str) -> RhaiResult<Array> {
    let re = compile(pattern)?;
    Ok(string_array(re.find_iter(text).map(|m| m.as_str())))
}

fn register_file_handle(engine: &mut Engine) {
    engine
        .register_type_with_name::<FileHandle>("AffectedFile")
        .register_fn("local_path", |f: &mut FileHandle| {
            f.file().local_path().to_string()
        })
        .register_fn("absolute_local_path", |f: &mut FileHandle| {
            f.file()
                .absolute_local_path()
                .to_string_lossy()
                .into_owned()
        })
        .register_fn("action", |f: &mut FileHandle| f.file().action().to_string())
        .register_fn("exists", |f: &mut FileHandle| f.file().exists())
        .register_fn("is_deleted", |f: &mut FileHandle| f.file().is_deleted())
        .register_fn("is_directory", |f: &mut FileHandle| f.file().is_directory())
        .register_fn("is_text_file", |f: &mut FileHandle| f.file().is_text_file())
        .register_fn("server_path", |f: &mut FileHandle| {
            f.file().server_path().to_string()
        })
        .register_fn("property", |f: &mut FileHandle, name: &str| {
            optional_string(f.file().property(name))
        })
        .register_fn("new_contents", |f: &mut FileHandle| {
            string_array(f.file().new_contents().iter().cloned())
        })
        .register_fn("old_contents", |f: &mut FileHandle| {
            string_array(f.file().old_contents().iter().cloned())
        })
        .register_fn("to_string", |f: &mut FileHandle| {
            f.file().local_path().to_string()
        })
        .register_fn("to_debug", |f: &mut FileHandle| {
            format!("{} {}", f.file().action(), f.file().local_path())
        });
}

fn register_change_handle(engine: &mut Engine) {
    engine
        .register_type_with_name::<ChangeHandle>("Change")
        .register_type_with_name::<RhsLines>("RightHandSideLines")
        .register_iterator::<RhsLines>()
        .register_fn("name", |c: &mut ChangeHandle| c.change.name().to_string())
        .register_fn("description_text", |c: &mut ChangeHandle| {
            c.change.description_text().to_string()
        })
        .register_fn("full_description_text", |c: &mut ChangeHandle| {
            c.change.full_description_text().to_string()
        })
        .register_fn("repository_root", |c: &mut ChangeHandle| {
            c.change.root().to_string_lossy().into_owned()
        })
        .register_get("tags", |c: &mut ChangeHandle| c.tags())
        // `change.BUG` falls back to this indexer when no getter matches.
        .register_indexer_get(|c: &mut ChangeHandle, key: ImmutableString| c.tag(key.as_str()))
        .register_fn("affected_files", |c: &mut ChangeHandle| {
            c.affected_files(false, true)
        })
        .register_fn(
            "affected_files",
            |c: &mut ChangeHandle, include_dirs: bool, include_deletes: bool| {
                c.affected_files(include_dirs, include_deletes)
            },
        )
        .register_fn("text_files", |c: &mut ChangeHandle| c.text_files(true))
        .register_fn("text_files", |c: &mut ChangeHandle, include_deletes: bool| {
            c.text_files(include_deletes)
        })
        .register_fn("affected_text_files", |c: &mut ChangeHandle| {
            c.affected_text_files(true)
        })
        .register_fn(
            "affected_text_files",
            |c: &mut ChangeHandle, include_deletes: bool| c.affected_text_files(include_deletes),
        )
        .register_fn("right_hand_side_lines", |c: &mut ChangeHandle| {
            c.right_hand_side_lines()
        })
        .register_fn("local_paths", |c: &mut ChangeHandle| {
            string_array(c.change.local_paths(false, true))
        })
        .register_fn(
            "local_paths",
            |c: &mut ChangeHandle, include_dirs: bool, include_deletes: bool| {
                string_array(c.change.local_paths(include_dirs, include_deletes))
            },
        )
        .register_fn("absolute_local_paths", |c: &mut ChangeHandle| {
            string_array(
                c.change
                    .absolute_local_paths(false, true)
                    .into_iter()
                    .map(|p| p.to_string_lossy().into_owned()),
            )
        })
        .register_fn(
            "absolute_local_paths",
            |c: &mut ChangeHandle, include_dirs: bool, include_deletes: bool| {
                string_array(
                    c.change
                        .absolute_local_paths(include_dirs, include_deletes)
                        .into_iter()
                        .map(|p| p.to_string_lossy().into_owned()),
                )
            },
        )
        .register_fn("server_paths", |c: &mut ChangeHandle| {
            string_array(c.change.server_paths(false, true))
        })
        .register_fn(
            "server_paths",
            |c: &mut ChangeHandle, include_dirs: bool, include_deletes: bool| {
                string_array(c.change.server_paths(include_dirs, include_deletes))
            },
        );
}

fn register_input(engine: &mut Engine) {
    engine
        .register_type_with_name::<InputApi>("InputApi")
        .register_get("change", |i: &mut InputApi| ChangeHandle {
            change: i.change.clone(),
        })
        .register_get("is_committing", |i: &mut InputApi| i.committing)
        .register_fn("presubmit_local_path", |i: &mut InputApi| {
            i.script_dir.to_string_lossy().into_owned()
        })
        .register_fn("affected_files", |i: &mut InputApi| i.file_handles(false, true))
        .register_fn(
            "affected_files",
            |i: &mut InputApi, include_dirs: bool, include_deletes: bool| {
                i.file_handles(include_dirs, include_deletes)
            },
        )
        .register_fn("text_files", |i: &mut InputApi| i.text_file_handles(true))
        .register_fn("text_files", |i: &mut InputApi, include_deletes: bool| {
            i.text_file_handles(include_deletes)
        })
        .register_fn("affected_text_files", |i: &mut InputApi| {
            i.change.warn_deprecated("affected_text_files", "text_files");
            i.text_file_handles(true)
        })
        .register_fn(
            "affected_text_files",
            |i: &mut InputApi, include_deletes: bool| {
                i.change.warn_deprecated("affected_text_files", "text_files");
                i.text_file_handles(include_deletes)
            },
        )
        .register_fn("right_hand_side_lines", |i: &mut InputApi| {
            i.right_hand_side_lines()
        })
        .register_fn("local_paths", |i: &mut InputApi| i.local_paths(false))
        .register_fn("local_paths", |i: &mut InputApi, include_dirs: bool| {
            i.local_paths(include_dirs)
        })
        .register_fn("absolute_local_paths", |i: &mut InputApi| {
            i.absolute_local_paths(false)
        })
        .register_fn("absolute_local_paths", |i: &mut InputApi, include_dirs: bool| {
            i.absolute_local_paths(include_dirs)
        })
        .register_fn("server_paths", |i: &mut InputApi| i.server_paths(false))
        .register_fn("server_paths", |i: &mut InputApi, include_dirs: bool| {
            i.server_paths(include_dirs)
        })
        .register_fn("local_to_depot_path", |i: &mut InputApi, path: &str| {
            optional_string(i.change.local_to_depot_path(path))
        })
        .register_fn("depot_to_local_path", |i: &mut InputApi, url: &str| {
            optional_string(
                i.change
                    .depot_to_local_path(url)
                    .map(|p| p.to_string_lossy().into_owned()),
            )
        })
        .register_fn("basename", |_: &mut InputApi, path: &str| basename(path))
        .register_fn("dirname", |_: &mut InputApi, path: &str| dirname(path))
        .register_fn("join_path", |_: &mut InputApi, a: &str, b: &str| {
            join_path(&[a, b])
        })
        .register_fn("join_path", |_: &mut InputApi, a: &str, b: &str, c: &str| {
            join_path(&[a, b, c])
        })
        .register_fn("fnmatch", |_: &mut InputApi, pattern: &str, name: &str| {
            fnmatch(pattern, name)
        })
        .register_fn("re_match", |_: &mut InputApi, pattern: &str, text: &str| {
            re_match(pattern, text)
        })
        .register_fn("re_find", |_: &mut InputApi, pattern: &str, text: &str| {
            re_find(pattern, text)
        })
        .register_fn("run_command", |i: &mut InputApi, argv: Array| {
            i.run_command(argv)
        })
        .register_fn("temp_file", |i: &mut InputApi, contents: &str| {
            i.temp_file(contents)
        })
        .register_fn("old_file_temp_path", |i: &mut InputApi, file: FileHandle| {
            i.old_file_temp_path(&file)
        })
        .register_fn("platform", |_: &mut InputApi| std::env::consts::OS.to_string())
        .register_fn("version", |_: &mut InputApi| crate::VERSION.to_string());
}

/// Register the input object and every handle type it hands out.
pub fn register(engine: &mut Engine) {
    register_file_handle(engine);
    register_change_handle(engine);
    register_input(engine);
}
