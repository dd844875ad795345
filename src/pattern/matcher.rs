//! Pattern matcher implementations

use crate::result::PatternError;
use regex::bytes::Regex;

/// Result of a pattern match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Start position of the match
    pub start: usize,
    /// End position of the match
    pub end: usize,
}

/// Trait for pattern matching
pub trait Matcher: Send + Sync {
    /// Find the first match in the buffer
    fn find(&self, buffer: &[u8]) -> Option<Match>;

    /// Check if pattern might partially match at buffer end
    fn partial_match(&self, _buffer: &[u8]) -> bool {
        false
    }
}

/// Exact string matcher using Boyer-Moore-Horspool algorithm.
///
/// With `ignore_case` both the pattern and the scanned bytes are folded to
/// ASCII lowercase; non-ASCII bytes compare exactly.
pub struct ExactMatcher {
    pattern: Vec<u8>,
    bad_char_table: [usize; 256],
    ignore_case: bool,
}

impl ExactMatcher {
    /// Create a new case-sensitive exact matcher
    pub fn new(pattern: impl Into<Vec<u8>>) -> Result<Self, PatternError> {
        Self::build(pattern.into(), false)
    }

    /// Create a new exact matcher that ignores ASCII case
    pub fn ignore_case(pattern: impl Into<Vec<u8>>) -> Result<Self, PatternError> {
        Self::build(pattern.into(), true)
    }

    fn build(mut pattern: Vec<u8>, ignore_case: bool) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        if ignore_case {
            pattern.make_ascii_lowercase();
        }

        // Build bad character table for Boyer-Moore-Horspool
        let mut bad_char_table = [pattern.len(); 256];
        for (i, &byte) in pattern.iter().enumerate().take(pattern.len() - 1) {
            let shift = pattern.len() - 1 - i;
            bad_char_table[byte as usize] = shift;
            if ignore_case {
                bad_char_table[byte.to_ascii_uppercase() as usize] = shift;
            }
        }

        Ok(Self {
            pattern,
            bad_char_table,
            ignore_case,
        })
    }

    fn matches_at(&self, window: &[u8]) -> bool {
        if self.ignore_case {
            window.eq_ignore_ascii_case(&self.pattern)
        } else {
            window == self.pattern.as_slice()
        }
    }
}

impl Matcher for ExactMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        let len = self.pattern.len();
        if buffer.len() < len {
            return None;
        }

        let mut pos = 0;
        while pos + len <= buffer.len() {
            if self.matches_at(&buffer[pos..pos + len]) {
                return Some(Match {
                    start: pos,
                    end: pos + len,
                });
            }

            // Shift using bad character table
            let shift_char = buffer[pos + len - 1];
            pos += self.bad_char_table[shift_char as usize];
        }

        None
    }

    fn partial_match(&self, buffer: &[u8]) -> bool {
        // Check if buffer ends with a proper prefix of the pattern
        (1..self.pattern.len().min(buffer.len() + 1)).any(|i| {
            let tail = &buffer[buffer.len() - i..];
            let prefix = &self.pattern[..i];
            if self.ignore_case {
                tail.eq_ignore_ascii_case(prefix)
            } else {
                tail == prefix
            }
        })
    }
}

/// Regex matcher over raw bytes
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Create a new regex matcher
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        self.regex.find(buffer).map(|m| Match {
            start: m.start(),
            end: m.end(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_matcher() {
        let matcher = ExactMatcher::new(b"hello").unwrap();
        let buffer = b"world hello there";

        let result = matcher.find(buffer).unwrap();
        assert_eq!(result.start, 6);
        assert_eq!(result.end, 11);
    }

    #[test]
    fn test_exact_matcher_is_case_sensitive() {
        let matcher = ExactMatcher::new(b"password:").unwrap();

        assert!(matcher.find(b"Password: ").is_none());
        assert!(matcher.find(b"password: ").is_some());
    }

    #[test]
    fn test_ignore_case_prompt_variants() {
        let matcher = ExactMatcher::ignore_case(b"password:").unwrap();

        for prompt in [
            &b"password: "[..],
            b"Password: ",
            b"PASSWORD:",
            b"forge@13.53.205.215's password: ",
            b"Password for forge@host: ",
        ] {
            assert!(matcher.find(prompt).is_some(), "{:?}", prompt);
        }
    }

    #[test]
    fn test_ignore_case_uppercase_pattern() {
        let matcher = ExactMatcher::ignore_case(b"PassWord:").unwrap();
        let result = matcher.find(b"Enter password: ").unwrap();

        assert_eq!(result.start, 6);
        assert_eq!(result.end, 15);
    }

    #[test]
    fn test_ignore_case_shift_on_uppercase_text() {
        // The bad character table must shift on the uppercase form as well,
        // otherwise the match straddling "XPASSWORD:" is skipped.
        let matcher = ExactMatcher::ignore_case(b"password:").unwrap();
        let result = matcher.find(b"XXXXXXXPASSWORD:").unwrap();

        assert_eq!(result.start, 7);
    }

    #[test]
    fn test_prompt_without_colon_not_matched() {
        let matcher = ExactMatcher::ignore_case(b"password:").unwrap();

        assert!(matcher.find(b"Your password has expired").is_none());
    }

    #[test]
    fn test_exact_matcher_partial() {
        let matcher = ExactMatcher::ignore_case(b"password:").unwrap();

        assert!(matcher.partial_match(b"Please enter Pass"));
        assert!(matcher.partial_match(b"pass"));
    }

    #[test]
    fn test_exact_matcher_partial_no_match() {
        let matcher = ExactMatcher::ignore_case(b"password:").unwrap();

        assert!(!matcher.partial_match(b"Please enter username"));
        assert!(!matcher.partial_match(b""));
    }

    #[test]
    fn test_exact_matcher_partial_full_match() {
        let matcher = ExactMatcher::new(b"password:").unwrap();

        // A complete occurrence at the end is a match, not a partial one
        assert!(!matcher.partial_match(b"enter password:"));
    }

    #[test]
    fn test_exact_matcher_not_found() {
        let matcher = ExactMatcher::new(b"missing").unwrap();

        assert!(matcher.find(b"this text does not contain it").is_none());
    }

    #[test]
    fn test_exact_matcher_multiple_occurrences() {
        let matcher = ExactMatcher::ignore_case(b"password:").unwrap();
        let result = matcher.find(b"password: Password:").unwrap();

        assert_eq!(result.start, 0);
        assert_eq!(result.end, 9);
    }

    #[test]
    fn test_exact_matcher_empty_pattern() {
        assert!(ExactMatcher::new(b"").is_err());
        assert!(ExactMatcher::ignore_case(b"").is_err());
    }

    #[test]
    fn test_exact_matcher_binary_data() {
        let matcher = ExactMatcher::ignore_case([0xFF, b'A', 0xFD]).unwrap();
        let result = matcher.find(b"prefix\xFFa\xFDsuffix").unwrap();

        assert_eq!(result.start, 6);
        assert_eq!(result.end, 9);
    }

    #[test]
    fn test_regex_matcher() {
        let matcher = RegexMatcher::new(Regex::new(r"(?i)passphrase for key '[^']+':").unwrap());
        let buffer = b"Enter passphrase for key '/root/.ssh/id_ed25519': ";

        let result = matcher.find(buffer).unwrap();
        assert_eq!(result.start, 6);
        assert_eq!(result.end, buffer.len() - 1);
    }

    #[test]
    fn test_regex_matcher_invalid_utf8() {
        let matcher = RegexMatcher::new(Regex::new(r"(?i)password:").unwrap());
        let buffer = b"\xff\xfe garbage then Password: ";

        assert!(matcher.find(buffer).is_some());
    }
}
