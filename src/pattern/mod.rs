//! Pattern matching for prompt detection

mod matcher;

pub use matcher::{Match, Matcher};

use crate::result::PatternError;
use regex::bytes::Regex;

/// Patterns recognised in pseudo-terminal output.
///
/// # Pattern Types
///
/// - **Exact**: case-sensitive byte string, Boyer-Moore-Horspool search
/// - **ExactIgnoreCase**: same search with ASCII case folding; this is how
///   password prompts are recognised (`Password:`, `password:`, `PASSWORD:`)
/// - **Regex**: byte-oriented regular expression, so invalid UTF-8 in the
///   output never prevents a match
///
/// # Examples
///
/// ```
/// use logprobe::Pattern;
///
/// let prompt = Pattern::exact_ignore_case("password:");
/// let banner = Pattern::exact("Welcome");
/// let custom = Pattern::regex(r"(?i)passphrase for key .*:").unwrap();
/// ```
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact, case-sensitive string match.
    Exact(String),

    /// Exact string match ignoring ASCII case.
    ExactIgnoreCase(String),

    /// Regular expression match over raw bytes.
    Regex(Regex),
}

impl Pattern {
    /// Create a case-sensitive exact pattern.
    pub fn exact(s: impl Into<String>) -> Self {
        Pattern::Exact(s.into())
    }

    /// Create an exact pattern that ignores ASCII case.
    ///
    /// ```
    /// use logprobe::Pattern;
    ///
    /// let matcher = Pattern::exact_ignore_case("password:").to_matcher().unwrap();
    /// assert!(matcher.find(b"forge@host's PASSWORD: ").is_some());
    /// ```
    pub fn exact_ignore_case(s: impl Into<String>) -> Self {
        Pattern::ExactIgnoreCase(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns a regex error if the pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Convert pattern to a matcher implementation
    pub fn to_matcher(&self) -> Result<Box<dyn Matcher>, PatternError> {
        use matcher::{ExactMatcher, RegexMatcher};

        match self {
            Pattern::Exact(s) => Ok(Box::new(ExactMatcher::new(s.as_bytes())?)),
            Pattern::ExactIgnoreCase(s) => {
                Ok(Box::new(ExactMatcher::ignore_case(s.as_bytes())?))
            }
            Pattern::Regex(r) => Ok(Box::new(RegexMatcher::new(r.clone()))),
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::Exact(s) => write!(f, "{s:?}"),
            Pattern::ExactIgnoreCase(s) => write!(f, "{s:?} (any case)"),
            Pattern::Regex(r) => write!(f, "/{}/", r.as_str()),
        }
    }
}
