//! Case-insensitive `*` globs over region names.

use regex::{Regex, RegexBuilder};

use crate::TeleportError;

/// A compiled region glob.
///
/// `*` matches any substring (including an empty one); everything else
/// is literal. Matching ignores case and covers the whole name, so a
/// pattern without `*` is an exact case-insensitive comparison.
///
/// ```
/// use wayfarer_teleport::RegionPattern;
///
/// let arenas = RegionPattern::new("arena*").unwrap();
/// assert!(arenas.matches("Arena_1vs1_77"));
/// assert!(!arenas.matches("myarena"));
/// ```
#[derive(Debug, Clone)]
pub struct RegionPattern {
    source: String,
    regex: Regex,
}

impl RegionPattern {
    pub fn new(pattern: &str) -> Result<Self, TeleportError> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = RegexBuilder::new(&format!("^{body}$"))
            .case_insensitive(true)
            .build()
            .map_err(|source| TeleportError::Pattern {
                pattern: pattern.to_owned(),
                source,
            })?;

        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    /// Compiles every pattern in `patterns`, failing on the first bad one.
    pub fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Self>, TeleportError> {
        patterns.iter().map(|p| Self::new(p.as_ref())).collect()
    }

    pub fn matches(&self, region: &str) -> bool {
        self.regex.is_match(region)
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for RegionPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}
