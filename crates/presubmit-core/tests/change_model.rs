//! Change model over a real git work tree.

use std::path::Path;
use std::process::Command;
use std::rc::Rc;

use presubmit_core::{Action, Change, GitMetadataSource, MetadataSource};

fn git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
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
    std::fs::create_dir_all(dir.path().join("docs/old")).unwrap();
    std::fs::write(dir.path().join("docs/old/guide.md"), "# Guide\n").unwrap();
    std::fs::write(dir.path().join("boo.h"), "#pragma once\n").unwrap();
    std::fs::write(dir.path().join("logo.png"), "png bytes").unwrap();
    std::fs::write(dir.path().join("main.c"), "int main() {}\n").unwrap();
    std::fs::write(dir.path().join(".gitattributes"), "*.png mime-type=image/png\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "initial"]);
    dir
}

fn change_from_work_tree(root: &Path, description: &str) -> Change {
    let source = GitMetadataSource::new(root);
    let entries = source.changed_entries().unwrap();
    Change::new(
        "wip",
        description,
        root,
        entries
            .into_iter()
            .map(|(code, path)| (Action::from_status(&code), path)),
        Rc::new(source),
    )
}

#[test]
fn deleted_file_still_resolves_through_the_store() {
    let repo = make_git_repo();
    std::fs::remove_file(repo.path().join("boo.h")).unwrap();

    let change = change_from_work_tree(repo.path(), "");
    let deleted = change
        .entries()
        .iter()
        .find(|f| f.local_path() == "boo.h")
        .unwrap();
    assert!(deleted.is_deleted());
    assert!(!deleted.exists());
    assert!(!deleted.is_directory());
    assert_eq!(deleted.server_path(), "HEAD/boo.h");
    assert!(!deleted.is_text_file());
    assert!(deleted.new_contents().is_empty());
    assert_eq!(deleted.old_contents(), ["#pragma once"]);
}

#[test]
fn binary_files_are_excluded_from_text_views() {
    let repo = make_git_repo();
    std::fs::write(repo.path().join("logo.png"), "new png bytes").unwrap();
    std::fs::write(repo.path().join("main.c"), "int main() { return 0; }\n").unwrap();

    let change = change_from_work_tree(repo.path(), "");
    let text: Vec<&str> = change
        .text_files(true)
        .into_iter()
        .map(|f| f.local_path())
        .collect();
    assert_eq!(text, ["main.c"]);
    assert_eq!(change.affected_files(false, true).len(), 2);

    let lines: Vec<(String, usize, String)> = change
        .right_hand_side_lines()
        .map(|(f, n, l)| (f.local_path().to_string(), n, l.to_string()))
        .collect();
    assert_eq!(
        lines,
        [("main.c".to_string(), 1, "int main() { return 0; }".to_string())]
    );
}

#[test]
fn untracked_files_have_no_server_path() {
    let repo = make_git_repo();
    std::fs::write(repo.path().join("notes.txt"), "hello\n").unwrap();

    let change = change_from_work_tree(repo.path(), "Add notes\nBUG=42");
    let notes = &change.entries()[0];
    assert_eq!(notes.action(), &Action::Unversioned);
    assert_eq!(notes.server_path(), "");
    assert!(notes.is_text_file());
    assert_eq!(notes.new_contents(), ["hello"]);
    assert_eq!(change.tag("BUG").value(), Some("42"));
    assert_eq!(change.description_text(), "Add notes");
}

#[test]
fn include_dirs_never_shrinks_the_view() {
    let repo = make_git_repo();
    let source: Rc<dyn MetadataSource> = Rc::new(GitMetadataSource::new(repo.path()));
    let change = Change::new(
        "dirs",
        "",
        repo.path(),
        [
            (Action::Modified, "docs"),
            (Action::Modified, "docs/old/guide.md"),
            (Action::Deleted, "gone.c"),
            (Action::Added, "main.c"),
        ],
        source,
    );
    let all = change.affected_files(true, true).len();
    let default = change.affected_files(false, true).len();
    assert!(all >= default);
    assert_eq!(all, 4);
    assert_eq!(default, 3);
    assert_eq!(change.affected_files(false, false).len(), 2);
}

#[test]
fn depot_paths_round_trip_for_tracked_files() {
    let repo = make_git_repo();
    let change = change_from_work_tree(repo.path(), "");
    let depot = change.local_to_depot_path("docs/old/guide.md").unwrap();
    assert_eq!(depot, "HEAD/docs/old/guide.md");
    assert_eq!(
        change.depot_to_local_path(&depot).unwrap(),
        repo.path().join("docs/old/guide.md")
    );
    assert_eq!(change.local_to_depot_path("missing.c"), None);
}
