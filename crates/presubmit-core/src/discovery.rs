//! Hierarchical discovery of verification scripts.
//!
//! A script applies to a touched path when it lives in any ancestor directory
//! of that path, the repository root included. Every distinct ancestor is
//! probed once; results are ordered shallowest first so ancestors always run
//! before their descendants.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::change::path::components;

/// List the scripts named `script_name` applicable to `files`, probing each
/// candidate with `probe`.
///
/// `files` are relative to `root` and may use either separator convention.
/// Paths that climb above the root only contribute the ancestors that stay
/// inside it.
pub fn list_relevant_scripts_with<I, S, P>(
    files: I,
    root: &Path,
    script_name: &str,
    mut probe: P,
) -> Vec<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    P: FnMut(&Path) -> bool,
{
    // (depth, directory) sorts shallowest first, then by path for determinism.
    let mut candidates: BTreeSet<(usize, PathBuf)> = BTreeSet::new();
    for file in files {
        let parts = components(file.as_ref());
        let Some((_, dirs)) = parts.split_last() else {
            continue;
        };
        candidates.insert((0, root.to_path_buf()));
        let mut dir = root.to_path_buf();
        for (depth, part) in dirs.iter().enumerate() {
            if *part == ".." {
                break;
            }
            dir.push(part);
            candidates.insert((depth + 1, dir.clone()));
        }
    }

    candidates
        .into_iter()
        .map(|(_, dir)| dir.join(script_name))
        .filter(|candidate| {
            let found = probe(candidate.as_path());
            debug!(candidate = %candidate.display(), found, "probed for script");
            found
        })
        .collect()
}

/// [`list_relevant_scripts_with`] probing the filesystem.
pub fn list_relevant_scripts<I, S>(files: I, root: &Path, script_name: &str) -> Vec<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    list_relevant_scripts_with(files, root, script_name, |p| p.is_file())
}
