//! Lexical path normalization for caller-supplied paths.

use std::path::MAIN_SEPARATOR_STR;

/// Split a path written with either separator convention into its components,
/// resolving `.` and `..` lexically. A leading `..` that cannot be resolved is
/// kept.
pub fn components(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if is_rooted(path) => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    parts
}

/// Normalize a path to the platform separator. An empty result becomes `.`.
pub fn normalize(path: &str) -> String {
    let parts = components(path);
    let joined = parts.join(MAIN_SEPARATOR_STR);
    match (is_rooted(path), joined.is_empty()) {
        (true, _) => format!("{MAIN_SEPARATOR_STR}{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

fn is_rooted(path: &str) -> bool {
    path.starts_with(['/', '\\'])
}
