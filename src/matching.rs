//! Input file matchers.
//!
//! Content inputs are declared as shell-style globs relative to the contents
//! directory. A leading `!` turns a pattern into an exclusion, and exclusions
//! win over inclusions regardless of their order in the list.

use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::BuildError;

lazy_static::lazy_static! {
    static ref PATTERN_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

/// Translate a glob into an anchored regex.
///
/// - `**/` matches zero or more directories, a trailing `**` matches anything
/// - `*` and `?` never cross a `/`
/// - `[abc]` and `[!abc]` are character classes
pub fn translate_pattern(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:[^/]+/)*");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let class: String = chars.clone().take_while(|&ch| ch != ']').collect();
                let closed = chars.clone().nth(class.chars().count()) == Some(']');
                if closed && !class.is_empty() {
                    for _ in 0..=class.chars().count() {
                        chars.next();
                    }
                    let body = class
                        .strip_prefix('!')
                        .map(|rest| format!("^{}", rest))
                        .unwrap_or(class);
                    out.push('[');
                    out.push_str(&body);
                    out.push(']');
                } else {
                    out.push_str("\\[");
                }
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    out.push('$');
    out
}

fn compile_pattern(pattern: &str) -> Result<Regex, BuildError> {
    let mut cache = PATTERN_CACHE.lock();
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&translate_pattern(pattern)).map_err(|e| {
        BuildError::configuration(format!("Invalid input pattern |{}|: {}", pattern, e))
    })?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Normalise a path to forward slashes for matching.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Compiled include/exclude list.
#[derive(Debug, Clone)]
pub struct InputMatcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl InputMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, BuildError> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for pattern in patterns {
            match pattern.strip_prefix('!') {
                Some(negated) => exclude.push(compile_pattern(negated)?),
                None => include.push(compile_pattern(pattern)?),
            }
        }
        Ok(Self { include, exclude })
    }

    /// Whether a `/`-separated relative path is selected.
    pub fn is_match(&self, relative: &str) -> bool {
        self.include.iter().any(|r| r.is_match(relative))
            && !self.exclude.iter().any(|r| r.is_match(relative))
    }

    /// Walk `base` and return the selected files as sorted relative paths.
    /// A missing base directory yields no files.
    pub fn matching_files(&self, base: &Path) -> Result<Vec<PathBuf>, BuildError> {
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(base).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf());
                BuildError::io(path, std::io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(base) else {
                continue;
            };
            if self.is_match(&normalize_path(relative)) {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_translate_pattern() {
        assert_eq!(translate_pattern("*.hbs"), "^[^/]*\\.hbs$");
        assert_eq!(translate_pattern("**"), "^.*$");
        assert_eq!(translate_pattern("**/index.md"), "^(?:[^/]+/)*index\\.md$");
        assert_eq!(translate_pattern("[!_]*.md"), "^[^_][^/]*\\.md$");
        assert_eq!(translate_pattern("a[b"), "^a\\[b$");
    }

    #[test]
    fn test_negated_patterns() {
        let matcher = InputMatcher::new(&[
            "*.hbs".to_string(),
            "*.md".to_string(),
            "!draft-*".to_string(),
        ])
        .unwrap();

        assert!(matcher.is_match("index.hbs"));
        assert!(matcher.is_match("about.md"));
        assert!(!matcher.is_match("draft-news.md"));
        assert!(!matcher.is_match("style.css"));
        assert!(!matcher.is_match("nested/index.hbs"));
    }

    #[test]
    fn test_matching_files() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join("nested")).unwrap();
        fs::write(base.join("b.md"), "").unwrap();
        fs::write(base.join("a.hbs"), "").unwrap();
        fs::write(base.join("skip.txt"), "").unwrap();
        fs::write(base.join("nested/c.md"), "").unwrap();

        let matcher = InputMatcher::new(&["**/*.md".to_string(), "*.hbs".to_string()]).unwrap();
        let files = matcher.matching_files(base).unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("a.hbs"),
                PathBuf::from("b.md"),
                PathBuf::from("nested/c.md"),
            ]
        );
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let matcher = InputMatcher::new(&["*".to_string()]).unwrap();
        assert!(matcher
            .matching_files(&temp_dir.path().join("absent"))
            .unwrap()
            .is_empty());
    }
}
