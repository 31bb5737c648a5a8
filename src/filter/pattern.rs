//! Case-insensitive "matches anywhere" patterns for subjects and filenames.

use regex::{Regex, RegexBuilder};

use crate::error::{FetchError, Result};

/// A compiled, case-insensitive regular expression.
///
/// Compiled once at startup; evaluation never fails.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile `source`. `what` names the option in the error message.
    ///
    /// Blank sources mean "no filter" and yield `Ok(None)`.
    pub fn compile(source: Option<&str>, what: &str) -> Result<Option<Self>> {
        let Some(source) = source.filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .map(|re| Some(Self(re)))
            .map_err(|e| FetchError::Config(format!("Invalid {what} pattern '{source}': {e}")))
    }

    /// `true` if the pattern matches anywhere in `haystack`.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

/// Shared semantics for subject and filename filters: an absent pattern
/// accepts everything.
pub fn passes_pattern(text: &str, pattern: Option<&Pattern>) -> bool {
    pattern.is_none_or(|p| p.is_match(text))
}

/// Subject filter; an absent subject is matched as the empty string.
pub fn passes_subject_pattern(subject: Option<&str>, pattern: Option<&Pattern>) -> bool {
    passes_pattern(subject.unwrap_or(""), pattern)
}

/// Filename filter, evaluated per attachment.
pub fn passes_filename_pattern(filename: &str, pattern: Option<&Pattern>) -> bool {
    passes_pattern(filename, pattern)
}
