//! Tag lines in change descriptions.
//!
//! A tag line is `KEY = value` where the key is uppercase letters and
//! underscores. Tag lines are removed from the prose view of the description.
//! When a key repeats, the first occurrence wins.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

fn tag_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<key>[A-Z_]+)\s*=\s*(?P<value>.*?)\s*$")
            .unwrap_or_else(|e| unreachable!("tag line pattern is valid: {e}"))
    })
}

/// Match a single line against the tag syntax, returning `(key, value)`.
pub fn match_tag_line(line: &str) -> Option<(&str, &str)> {
    let caps = tag_line_re().captures(line)?;
    let key = caps.name("key")?.as_str();
    let value = caps.name("value").map_or("", |m| m.as_str());
    Some((key, value))
}

/// A description split into tags and prose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDescription {
    /// Tag key to trimmed value.
    pub tags: BTreeMap<String, String>,
    /// Description without tag lines, trailing whitespace trimmed.
    pub prose: String,
}

/// Split a raw description into tags and prose.
pub fn parse_description(raw: &str) -> ParsedDescription {
    let mut tags = BTreeMap::new();
    let mut prose = Vec::new();

    for line in raw.lines() {
        match match_tag_line(line) {
            Some((key, value)) => {
                tags.entry(key.to_string())
                    .or_insert_with(|| value.to_string());
            }
            None => prose.push(line),
        }
    }

    ParsedDescription {
        tags,
        prose: prose.join("\n").trim_end().to_string(),
    }
}

/// Result of a tag lookup. `Absent` is distinct from an empty value, but both
/// are falsy for [`Tag::is_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag<'a> {
    Absent,
    Value(&'a str),
}

impl<'a> Tag<'a> {
    /// The value, if the tag is present.
    pub fn value(self) -> Option<&'a str> {
        match self {
            Tag::Absent => None,
            Tag::Value(v) => Some(v),
        }
    }

    /// Truthiness used by checks: present and non-empty.
    pub fn is_set(self) -> bool {
        matches!(self, Tag::Value(v) if !v.is_empty())
    }
}
