//! Resolver file discovery from configured glob patterns.
//!
//! Patterns are single-level: the directory part is taken literally and only
//! the final file-name component may contain `*` (any run of characters) or
//! `?` (exactly one character). `**` is not supported.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No resolver files matched the configured patterns: {}", patterns.join(", "))]
    NoMatches { patterns: Vec<String> },
    #[error("Invalid file pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Failed to list directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One configured pattern split into where to look and what to keep.
#[derive(Debug, Clone)]
pub struct FilePattern {
    pub pattern: String,
    pub base_dir: PathBuf,
    matcher: Regex,
}

impl FilePattern {
    /// Split `pattern` and resolve a relative base directory against `root`.
    pub fn parse(pattern: &str, root: &Path) -> Result<Self, DiscoveryError> {
        let invalid = |reason: &str| DiscoveryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };
        if pattern.trim().is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if pattern.contains("**") {
            return Err(invalid("recursive `**` patterns are not supported"));
        }

        let normalized = pattern.replace('\\', "/");
        let (dir, file) = match normalized.rsplit_once('/') {
            Some((dir, file)) => (if dir.is_empty() { "/" } else { dir }, file),
            None => (".", normalized.as_str()),
        };
        if file.is_empty() {
            return Err(invalid("pattern has no file name component"));
        }
        if dir.contains(['*', '?']) {
            return Err(invalid("wildcards are only allowed in the file name"));
        }

        let dir = Path::new(dir);
        let base_dir = if dir.is_absolute() { dir.to_path_buf() } else { root.join(dir) };
        let matcher = Regex::new(&file_name_regex(file)).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self { pattern: pattern.to_string(), base_dir, matcher })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.matcher.is_match(file_name)
    }

    /// Files directly inside `base_dir` whose name matches.
    pub fn expand(&self) -> Result<Vec<PathBuf>, DiscoveryError> {
        if !self.base_dir.is_dir() {
            debug!(pattern = %self.pattern, dir = %self.base_dir.display(), "base directory missing");
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.base_dir).map_err(|source| DiscoveryError::ReadDir {
            path: self.base_dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DiscoveryError::ReadDir {
                path: self.base_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if self.matches(name) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// Anchored regex for a file-name pattern: `*` → `.*`, `?` → `.`, the rest literal.
pub fn file_name_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// Expand every pattern, deduplicate by absolute path and sort.
///
/// Fails when nothing matched at all; the error echoes every pattern.
pub fn discover(patterns: &[String], root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut found = BTreeSet::new();
    for raw in patterns {
        let pattern = FilePattern::parse(raw, root)?;
        for path in pattern.expand()? {
            let absolute = path.canonicalize().unwrap_or(path);
            found.insert(absolute);
        }
    }

    if found.is_empty() {
        return Err(DiscoveryError::NoMatches { patterns: patterns.to_vec() });
    }
    debug!(count = found.len(), "discovered resolver files");
    Ok(found.into_iter().collect())
}
