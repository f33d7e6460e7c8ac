//! Git-backed metadata source.
//!
//! Every query shells out to `git` in the repository root. The server identity
//! of a tracked path is `<origin url>/<repo-relative path>`, or `HEAD/<path>`
//! when the repository has no `origin` remote.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{MetadataError, MetadataResult, MetadataSource, NodeInfo, NodeKind};

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn run_git(repo_dir: &Path, args: &[&str]) -> MetadataResult<String> {
    let output = Command::new("git").args(args).current_dir(repo_dir).output()?;

    if !output.status.success() {
        return Err(MetadataError::Command {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Metadata source answering from a git work tree.
#[derive(Debug)]
pub struct GitMetadataSource {
    root: PathBuf,
    identity: OnceCell<String>,
}

impl GitMetadataSource {
    /// Source rooted at an explicit work-tree root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            identity: OnceCell::new(),
        }
    }

    /// Locate the work-tree root containing `dir`.
    pub fn discover(dir: &Path) -> MetadataResult<Self> {
        let top = run_git(dir, &["rev-parse", "--show-toplevel"])?;
        Ok(Self::new(PathBuf::from(top.trim())))
    }

    /// Work-tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Repository identity used as the prefix of server paths.
    pub fn identity(&self) -> &str {
        self.identity.get_or_init(|| {
            run_git(&self.root, &["remote", "get-url", "origin"])
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .ok()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| "HEAD".to_string())
        })
    }

    /// Entries changed in the work tree as `(status code, repo-relative path)`.
    ///
    /// Status codes use the single-letter action vocabulary (`A`, `M`, `D`,
    /// `R`, `?`); renames report the new path.
    pub fn changed_entries(&self) -> MetadataResult<Vec<(String, String)>> {
        let out = run_git(
            &self.root,
            &["status", "--porcelain=v1", "-z", "--untracked-files=all"],
        )?;

        let mut entries = Vec::new();
        let mut records = out.split('\0').filter(|r| !r.is_empty());
        while let Some(record) = records.next() {
            if record.len() < 4 {
                continue;
            }
            let (xy, path) = record.split_at(3);
            let mut codes = xy.chars();
            let x = codes.next().unwrap_or(' ');
            let y = codes.next().unwrap_or(' ');
            let code = match (x, y) {
                ('?', '?') => '?',
                (' ', y) => y,
                (x, _) => x,
            };
            if matches!(x, 'R' | 'C') {
                // Renames and copies are followed by their source path.
                records.next();
            }
            entries.push((code.to_string(), path.to_string()));
        }
        Ok(entries)
    }

    /// Repository-relative, `/`-separated form of a local path.
    fn relative(&self, path: &Path) -> MetadataResult<String> {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map_err(|_| MetadataError::OutsideRoot(path.to_path_buf()))?
        } else {
            path
        };
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(parts.join("/"))
    }

    /// Map a server path back to its repository-relative path.
    fn depot_relative(&self, path: &Path) -> Option<String> {
        let text = path.to_str()?;
        let prefix = format!("{}/", self.identity());
        text.strip_prefix(&prefix).map(str::to_string)
    }
}

impl MetadataSource for GitMetadataSource {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn info(&self, path: &Path) -> MetadataResult<NodeInfo> {
        let rel = match self.depot_relative(path) {
            Some(rel) => rel,
            None => self.relative(path)?,
        };
        if rel.is_empty() {
            return Ok(NodeInfo::default());
        }

        let listing = run_git(&self.root, &["ls-tree", "HEAD", "--", &rel])?;
        let Some(line) = listing.lines().next() else {
            return Ok(NodeInfo::default());
        };

        // "<mode> <type> <object>\t<path>"
        let kind = match line.split_whitespace().nth(1) {
            Some("blob") => NodeKind::File,
            Some("tree") => NodeKind::Directory,
            Some(other) => NodeKind::Other(other.to_string()),
            None => return Ok(NodeInfo::default()),
        };

        Ok(NodeInfo {
            url: Some(format!("{}/{}", self.identity(), rel)),
            kind: Some(kind),
            local_path: Some(self.root.join(&rel)),
        })
    }

    fn property(&self, path: &Path, name: &str) -> MetadataResult<Option<String>> {
        let rel = self.relative(path)?;
        let out = run_git(&self.root, &["check-attr", name, "--", &rel])?;

        // "<path>: <attr>: <value>"
        let value = out
            .lines()
            .next()
            .and_then(|line| line.rsplit_once(": "))
            .map(|(_, value)| value.trim());

        Ok(match value {
            None | Some("unspecified") | Some("unset") => None,
            Some(value) => Some(value.to_string()),
        })
    }

    fn read_file(&self, path: &Path) -> MetadataResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn read_base_file(&self, path: &Path) -> MetadataResult<String> {
        let rel = self.relative(path)?;
        run_git(&self.root, &["show", &format!("HEAD:{rel}")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init"]);
        git(dir.path(), &["config", "user.name", "test-user"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn a() {}\n").unwrap();
        std::fs::write(dir.path().join("logo.png"), "not really a png").unwrap();
        std::fs::write(
            dir.path().join(".gitattributes"),
            "*.png mime-type=image/png\n",
        )
        .unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-m", "initial"]);
        dir
    }

    #[test]
    fn is_git_repo_true_inside_work_tree() {
        let repo = make_git_repo();
        assert!(is_git_repo(repo.path()));
        assert!(is_git_repo(&repo.path().join("src")));
    }

    #[test]
    fn is_git_repo_false_for_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_git_repo(dir.path()));
    }

    #[test]
    fn info_reports_tracked_file_and_directory() {
        let repo = make_git_repo();
        let source = GitMetadataSource::new(repo.path());

        let file = source.info(&repo.path().join("src/lib.rs")).unwrap();
        assert_eq!(file.kind, Some(NodeKind::File));
        assert_eq!(file.url.as_deref(), Some("HEAD/src/lib.rs"));

        let dir = source.info(&repo.path().join("src")).unwrap();
        assert!(dir.is_directory());
    }

    #[test]
    fn info_is_empty_for_untracked_file() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("new.txt"), "x").unwrap();
        let source = GitMetadataSource::new(repo.path());
        assert_eq!(
            source.info(&repo.path().join("new.txt")).unwrap(),
            NodeInfo::default()
        );
    }

    #[test]
    fn info_accepts_server_paths() {
        let repo = make_git_repo();
        let source = GitMetadataSource::new(repo.path());
        let info = source.info(Path::new("HEAD/src/lib.rs")).unwrap();
        assert_eq!(info.local_path, Some(repo.path().join("src/lib.rs")));
    }

    #[test]
    fn property_reads_git_attributes() {
        let repo = make_git_repo();
        let source = GitMetadataSource::new(repo.path());
        assert_eq!(
            source
                .property(&repo.path().join("logo.png"), "mime-type")
                .unwrap()
                .as_deref(),
            Some("image/png")
        );
        assert_eq!(
            source
                .property(&repo.path().join("src/lib.rs"), "mime-type")
                .unwrap(),
            None
        );
    }

    #[test]
    fn read_base_file_returns_committed_text() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("src/lib.rs"), "fn b() {}\n").unwrap();
        let source = GitMetadataSource::new(repo.path());
        let path = repo.path().join("src/lib.rs");
        assert_eq!(source.read_base_file(&path).unwrap(), "fn a() {}\n");
        assert_eq!(source.read_file(&path).unwrap(), "fn b() {}\n");
    }

    #[test]
    fn changed_entries_lists_work_tree_changes() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("src/lib.rs"), "fn b() {}\n").unwrap();
        std::fs::write(repo.path().join("notes.txt"), "hello").unwrap();
        std::fs::remove_file(repo.path().join("logo.png")).unwrap();

        let source = GitMetadataSource::new(repo.path());
        let mut entries = source.changed_entries().unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                ("?".to_string(), "notes.txt".to_string()),
                ("D".to_string(), "logo.png".to_string()),
                ("M".to_string(), "src/lib.rs".to_string()),
            ]
        );
    }
}
