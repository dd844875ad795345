//! Result types for probe operations

mod error;

pub use error::{PatternError, ProbeError};

use crate::probe::{FailureKind, Phase};
use std::borrow::Cow;

/// How a prompt-detection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectOutcome {
    /// The pattern was found in the captured output.
    Matched,
    /// The deadline elapsed before the pattern appeared.
    Timeout,
    /// The stream closed (zero-length read) before the pattern appeared.
    Eof,
    /// A read on the stream failed. The loop stops instead of retrying.
    ReadError,
}

/// Result of [`Session::read_until`](crate::Session::read_until).
///
/// A detection always carries the bytes captured so far, whether or not the
/// pattern was found.
///
/// # Examples
///
/// ```no_run
/// use logprobe::{Pattern, Session};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::builder().spawn("ssh", ["user@example.com", "uptime"])?;
/// let detection = session.read_until(&Pattern::exact_ignore_case("password:")).await?;
///
/// if detection.is_match() {
///     println!("prompt at {:?}", detection.span());
/// } else {
///     println!("no prompt, captured: {}", detection.text());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Detection {
    /// Every byte captured during the loop.
    pub buffer: Vec<u8>,

    /// Why the loop stopped.
    pub outcome: DetectOutcome,

    /// Byte range of the match inside `buffer`, when matched.
    pub(crate) span: Option<(usize, usize)>,
}

impl Detection {
    pub(crate) fn matched(buffer: Vec<u8>, start: usize, end: usize) -> Self {
        Self {
            buffer,
            outcome: DetectOutcome::Matched,
            span: Some((start, end)),
        }
    }

    pub(crate) fn unmatched(buffer: Vec<u8>, outcome: DetectOutcome) -> Self {
        Self {
            buffer,
            outcome,
            span: None,
        }
    }

    /// `true` when the pattern was found.
    pub fn is_match(&self) -> bool {
        self.outcome == DetectOutcome::Matched
    }

    /// Start and end offsets of the match in [`buffer`](Self::buffer).
    pub fn span(&self) -> Option<(usize, usize)> {
        self.span
    }

    /// The matched bytes, decoded leniently.
    pub fn matched_text(&self) -> Option<Cow<'_, str>> {
        self.span
            .map(|(start, end)| String::from_utf8_lossy(&self.buffer[start..end]))
    }

    /// The whole captured buffer, decoded leniently.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }
}

/// Summary of one complete probe run.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Terminal phase: [`Phase::Done`] or [`Phase::Failed`].
    pub phase: Phase,

    /// The prompt detection that opened the run.
    pub detection: Detection,

    /// Whether the credential line was written to the session.
    pub credential_sent: bool,

    /// Bytes read from the session during passthrough.
    pub relayed_bytes: u64,
}

impl ProbeReport {
    /// `true` when the run reached [`Phase::Done`].
    pub fn is_success(&self) -> bool {
        self.phase == Phase::Done
    }

    /// The failure, if the run ended in [`Phase::Failed`].
    pub fn failure(&self) -> Option<FailureKind> {
        match self.phase {
            Phase::Failed(kind) => Some(kind),
            _ => None,
        }
    }
}
