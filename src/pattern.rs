//! Pattern Engine (spec §4.2, component C2).
//!
//! Grounded on the teacher's `filter.rs` (`FileFilter`, `globset`-backed
//! include/exclude sets) generalized to the spec's normalization rules and
//! include/ignore precedence, and on the Python original's
//! `query_parser._parse_patterns`/`_normalize_pattern` for the exact
//! validation and normalization semantics.

use std::collections::HashSet;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::defaults::DEFAULT_IGNORE_PATTERNS;
use crate::error::Error;

/// Characters allowed in a pattern beyond `[A-Za-z0-9]` (spec §4.2).
const EXTRA_ALPHABET: &str = "-_./+*";

/// Strips a leading path separator and expands a trailing one to `*`
/// (directory match), per spec §4.2.
pub fn normalize_pattern(pattern: &str) -> String {
    let stripped = pattern.trim_start_matches('/');
    if let Some(dir) = stripped.strip_suffix('/') {
        format!("{dir}/*")
    } else {
        stripped.to_string()
    }
}

pub fn is_valid_pattern(pattern: &str) -> bool {
    !pattern.is_empty()
        && pattern
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || EXTRA_ALPHABET.contains(c))
}

/// Splits on commas and spaces, validates, and normalizes each pattern
/// (spec §4.2 "Pattern syntax").
pub fn split_patterns(raw: &[String]) -> Result<Vec<String>, Error> {
    let mut out = Vec::new();
    for item in raw {
        for part in item.split([',', ' ']) {
            if part.is_empty() {
                continue;
            }
            if !is_valid_pattern(part) {
                return Err(Error::PatternSyntax(part.to_string()));
            }
            out.push(normalize_pattern(part));
        }
    }
    Ok(out)
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, Error> {
    patterns
        .iter()
        .try_fold(GlobSetBuilder::new(), |mut builder, p| {
            let glob = Glob::new(p).map_err(|e| Error::PatternSyntax(format!("{p}: {e}")))?;
            builder.add(glob);
            Ok::<_, Error>(builder)
        })?
        .build()
        .map_err(|e| Error::PatternSyntax(e.to_string()))
}

/// Evaluates a candidate path against the merged default+user ignore set and
/// the optional include set (spec §4.2 "Evaluation").
pub struct PatternEngine {
    include_set: Option<GlobSet>,
    ignore_set: GlobSet,
}

impl PatternEngine {
    /// `include_patterns`/`ignore_patterns` are raw, unsplit user input (may
    /// contain comma/space-separated groups); the built-in ignore set is
    /// always merged in.
    pub fn new(include_patterns: &[String], ignore_patterns: &[String]) -> Result<Self, Error> {
        Self::with_extra_ignores(include_patterns, ignore_patterns, &[])
    }

    /// Like [`Self::new`], but folds in additional already-normalized ignore
    /// patterns (used by the walker to layer `.gitignore` entries scoped to
    /// a subtree, per spec §4.4 ".gitignore mode").
    pub fn with_extra_ignores(
        include_patterns: &[String],
        ignore_patterns: &[String],
        extra_ignores: &[String],
    ) -> Result<Self, Error> {
        let include_parsed = split_patterns(include_patterns)?;

        let mut ignore_parsed: Vec<String> = DEFAULT_IGNORE_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .collect();
        ignore_parsed.extend(split_patterns(ignore_patterns)?);
        ignore_parsed.extend(extra_ignores.iter().cloned());

        // Include takes precedence: patterns in both lists are dropped from
        // ignore (spec §3 invariants, §4.2).
        if !include_parsed.is_empty() {
            let included: HashSet<&String> = include_parsed.iter().collect();
            ignore_parsed.retain(|p| !included.contains(p));
        }

        let include_set = if include_parsed.is_empty() {
            None
        } else {
            Some(build_glob_set(&include_parsed)?)
        };
        let ignore_set = build_glob_set(&ignore_parsed)?;

        Ok(Self {
            include_set,
            ignore_set,
        })
    }

    /// `true` if `rel_path` (POSIX-relative to the scan root) should be
    /// selected for the digest.
    pub fn should_include(&self, rel_path: &Path) -> bool {
        if self.ignore_set.is_match(rel_path) {
            return false;
        }
        self.include_set
            .as_ref()
            .is_none_or(|set| set.is_match(rel_path))
    }

    /// `true` if the walker should descend into a directory at `rel_path`.
    ///
    /// Conservative per spec §4.4: a directory is pruned only when it (or
    /// everything beneath it) is matched by an ignore glob; an include set
    /// that doesn't (yet) match the directory's own path never blocks
    /// descent, since a deeper include pattern might still match a
    /// descendant. The synthetic child probe catches `dir/**`-style ignore
    /// globs that don't match the bare directory path itself.
    pub fn should_descend(&self, rel_path: &Path) -> bool {
        if self.ignore_set.is_match(rel_path) {
            return false;
        }
        let probe = rel_path.join("\u{0}gitdigest-probe");
        !self.ignore_set.is_match(&probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_ignores_applied() {
        let engine = PatternEngine::new(&[], &[]).unwrap();
        assert!(!engine.should_include(&PathBuf::from("Cargo.lock")));
        assert!(!engine.should_include(&PathBuf::from("node_modules/foo.js")));
        assert!(!engine.should_include(&PathBuf::from("image.png")));
        assert!(!engine.should_include(&PathBuf::from(".git/HEAD")));
    }

    #[test]
    fn custom_ignore() {
        let engine = PatternEngine::new(&[], &["*.md".to_string()]).unwrap();
        assert!(!engine.should_include(&PathBuf::from("README.md")));
        assert!(engine.should_include(&PathBuf::from("main.rs")));
    }

    #[test]
    fn include_only() {
        let engine = PatternEngine::new(&["*.rs".to_string()], &[]).unwrap();
        assert!(engine.should_include(&PathBuf::from("main.rs")));
        assert!(!engine.should_include(&PathBuf::from("README.md")));
    }

    #[test]
    fn include_overrides_default_ignore() {
        // dist/bundle.js is default-ignored via "dist/**"; an include pattern
        // for it must win (spec §8 scenario 3).
        let engine = PatternEngine::new(&["dist/*.js".to_string()], &[]).unwrap();
        assert!(engine.should_include(&PathBuf::from("dist/bundle.js")));
    }

    #[test]
    fn ignore_wins_when_not_in_include() {
        let engine = PatternEngine::new(
            &["*.rs".to_string()],
            &["test_*.rs".to_string()],
        )
        .unwrap();
        assert!(!engine.should_include(&PathBuf::from("test_helper.rs")));
        assert!(engine.should_include(&PathBuf::from("main.rs")));
    }

    #[test]
    fn pattern_monotonicity_adding_ignore_shrinks_set() {
        let before = PatternEngine::new(&[], &[]).unwrap();
        let after = PatternEngine::new(&[], &["*.rs".to_string()]).unwrap();
        assert!(before.should_include(&PathBuf::from("main.rs")));
        assert!(!after.should_include(&PathBuf::from("main.rs")));
    }

    #[test]
    fn pattern_monotonicity_adding_include_grows_set() {
        let before = PatternEngine::new(&[], &[]).unwrap();
        let after = PatternEngine::new(&["*.md".to_string()], &[]).unwrap();
        assert!(before.should_include(&PathBuf::from("README.md")));
        assert!(after.should_include(&PathBuf::from("README.md")));
        assert!(!after.should_include(&PathBuf::from("main.rs")));
    }

    #[test]
    fn normalize_strips_leading_separator() {
        assert_eq!(normalize_pattern("/src/main.rs"), "src/main.rs");
    }

    #[test]
    fn normalize_trailing_separator_becomes_wildcard() {
        assert_eq!(normalize_pattern("dist/"), "dist/*");
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err = PatternEngine::new(&[], &["foo bar!".to_string()]);
        assert!(err.is_ok()); // splits on space into "foo" and "bar!" ...
        let err = split_patterns(&["bar!".to_string()]);
        assert!(matches!(err, Err(Error::PatternSyntax(_))));
    }

    #[test]
    fn split_on_commas_and_spaces() {
        let parsed = split_patterns(&["*.rs, *.toml src/*".to_string()]).unwrap();
        assert_eq!(parsed, vec!["*.rs", "*.toml", "src/*"]);
    }

    #[test]
    fn should_descend_prunes_ignored_directory() {
        let engine = PatternEngine::new(&[], &[]).unwrap();
        assert!(!engine.should_descend(&PathBuf::from("node_modules")));
        assert!(engine.should_descend(&PathBuf::from("src")));
    }

    #[test]
    fn should_descend_prunes_double_star_ignore() {
        // "target/**" doesn't match the bare "target" path, but the walker
        // should still prune it via the synthetic child probe.
        let engine = PatternEngine::new(&[], &[]).unwrap();
        assert!(!engine.should_descend(&PathBuf::from("target")));
    }

    #[test]
    fn should_descend_conservative_with_deep_include() {
        // An include rooted deeper than the directory's own path must not
        // prune descent into that directory.
        let engine = PatternEngine::new(&["src/deep/*.rs".to_string()], &[]).unwrap();
        assert!(engine.should_descend(&PathBuf::from("src")));
    }
}
