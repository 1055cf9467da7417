//! Glob, grep and edit matching shared by every backend.
//!
//! Glob semantics: patterns match the full normalized path with a literal
//! separator, so `*` stays inside one segment and `**` crosses segments.
//! Relative patterns are anchored at `/`:
//!
//! | pattern     | `/a.md` | `/b.txt` | `/sub/c.md` |
//! |-------------|---------|----------|-------------|
//! | `*.md`      | yes     |          |             |
//! | `**/*.md`   | yes     |          | yes         |
//! | `sub/*`     |         |          | yes         |

use globset::GlobBuilder;
use regex::Regex;

use super::error::{VfsError, VfsResult};
use super::types::{Entry, GrepMatch, GrepResult};

/// A compiled glob over absolute paths.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    anchored: String,
    matcher: globset::GlobMatcher,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> VfsResult<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(VfsError::invalid_pattern(pattern, "pattern is empty"));
        }
        let anchored = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        let glob = GlobBuilder::new(&anchored)
            .literal_separator(true)
            .build()
            .map_err(|e| VfsError::invalid_pattern(pattern, e))?;
        Ok(Self {
            matcher: glob.compile_matcher(),
            anchored,
        })
    }

    /// The pattern as matched, with its leading `/`.
    pub fn as_str(&self) -> &str {
        &self.anchored
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Matching paths from `entries`, in the iterator's order.
    pub fn filter<'a>(&self, entries: impl IntoIterator<Item = &'a Entry>) -> Vec<String> {
        entries
            .into_iter()
            .filter(|e| self.is_match(&e.path))
            .map(|e| e.path.clone())
            .collect()
    }
}

/// A compiled line search.
///
/// The pattern is tried as a regex first; if it doesn't compile it is
/// searched for literally, so `foo(` still finds `foo(bar)`.
#[derive(Debug, Clone)]
pub struct LinePattern {
    re: Regex,
}

impl LinePattern {
    pub fn new(pattern: &str) -> VfsResult<Self> {
        if pattern.is_empty() {
            return Err(VfsError::invalid_pattern(pattern, "pattern is empty"));
        }
        let re = match Regex::new(pattern) {
            Ok(r) => r,
            Err(_) => Regex::new(&regex::escape(pattern))
                .map_err(|e| VfsError::invalid_pattern(pattern, e))?,
        };
        Ok(Self { re })
    }

    /// Matching lines of one file, 1-based.
    pub fn search(&self, content: &str) -> Vec<GrepMatch> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| self.re.is_match(line))
            .map(|(idx, line)| GrepMatch {
                line: idx + 1,
                text: line.to_string(),
            })
            .collect()
    }

    /// Search every entry; files without a match are left out.
    pub fn search_entries<'a>(&self, entries: impl IntoIterator<Item = &'a Entry>) -> GrepResult {
        let mut out = GrepResult::new();
        for entry in entries {
            let hits = self.search(&entry.content);
            if !hits.is_empty() {
                out.insert(entry.path.clone(), hits);
            }
        }
        out
    }
}

/// Replace `old` with `new` in `content`.
///
/// Without `replace_all`, `old` must occur exactly once. Returns the new
/// content and the number of replacements; state is untouched on error.
pub fn replace_in(
    path: &str,
    content: &str,
    old: &str,
    new: &str,
    replace_all: bool,
) -> VfsResult<(String, usize)> {
    if old.is_empty() {
        return Err(VfsError::no_match(path, 0));
    }
    let occurrences = content.matches(old).count();
    if occurrences == 0 || (!replace_all && occurrences > 1) {
        return Err(VfsError::no_match(path, occurrences));
    }
    let updated = if replace_all {
        content.replace(old, new)
    } else {
        content.replacen(old, new, 1)
    };
    Ok((updated, if replace_all { occurrences } else { 1 }))
}
