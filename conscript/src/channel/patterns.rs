//! Pattern matching utilities for prompt detection.

use std::fmt;
use std::ops::Range;

use memchr::memmem;
use regex::bytes::Regex;

use crate::error::PatternError;

/// Trait for prompt matching - regex by default, extensible for custom parsers.
pub trait PromptMatcher: Send + Sync {
    /// Returns the byte range of the first match, or None if no match.
    fn find_match(&self, data: &[u8]) -> Option<Range<usize>>;

    /// Check if the data matches the pattern.
    fn is_match(&self, data: &[u8]) -> bool {
        self.find_match(data).is_some()
    }

    /// Upper bound on the length of a match, if there is one.
    ///
    /// Buffers use this to rescan exactly far enough back to catch a match
    /// split across reads. `None` means unbounded.
    fn max_match_len(&self) -> Option<usize> {
        None
    }
}

/// Regex-based prompt matcher.
impl PromptMatcher for Regex {
    fn find_match(&self, data: &[u8]) -> Option<Range<usize>> {
        self.find(data).map(|m| m.range())
    }
}

/// A prompt to wait for: exact text or a regular expression.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact substring match.
    Literal(String),

    /// Regular expression match.
    Regex(Regex),
}

impl Pattern {
    /// Create a pattern matching `text` exactly.
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// Compile a regular expression pattern.
    ///
    /// Expressions that match empty text are rejected: they would match at
    /// the cursor straight away. Console prompts copied verbatim often
    /// contain a bare `|`, which does exactly that (`key: |1|`).
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        let re = Regex::new(pattern)?;
        if re.is_match(b"") {
            return Err(PatternError::MatchesEmpty {
                pattern: pattern.to_string(),
            });
        }
        Ok(Pattern::Regex(re))
    }

    /// The source text of the pattern.
    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(text) => text,
            Pattern::Regex(re) => re.as_str(),
        }
    }
}

impl PromptMatcher for Pattern {
    fn find_match(&self, data: &[u8]) -> Option<Range<usize>> {
        match self {
            Pattern::Literal(text) => {
                let needle = text.as_bytes();
                memmem::find(data, needle).map(|start| start..start + needle.len())
            }
            Pattern::Regex(re) => re.find_match(data),
        }
    }

    fn max_match_len(&self) -> Option<usize> {
        match self {
            Pattern::Literal(text) => Some(text.len()),
            Pattern::Regex(_) => None,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion into a [`Pattern`].
///
/// Plain strings are compiled as regular expressions, since console prompts
/// are usually written that way (`r"\? \(Y/N\): "`). Wrap text in
/// [`Pattern::literal`] to match it verbatim.
pub trait IntoPattern {
    /// Convert into a pattern, compiling it if needed.
    fn into_pattern(self) -> Result<Pattern, PatternError>;
}

impl IntoPattern for Pattern {
    fn into_pattern(self) -> Result<Pattern, PatternError> {
        Ok(self)
    }
}

impl IntoPattern for &Pattern {
    fn into_pattern(self) -> Result<Pattern, PatternError> {
        Ok(self.clone())
    }
}

impl IntoPattern for &str {
    fn into_pattern(self) -> Result<Pattern, PatternError> {
        Pattern::regex(self)
    }
}

impl IntoPattern for String {
    fn into_pattern(self) -> Result<Pattern, PatternError> {
        Pattern::regex(&self)
    }
}

impl IntoPattern for &String {
    fn into_pattern(self) -> Result<Pattern, PatternError> {
        Pattern::regex(self)
    }
}
