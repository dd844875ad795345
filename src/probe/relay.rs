//! Output passthrough from the session to a local sink

use crate::pattern::{Matcher, Pattern};
use crate::result::PatternError;
use crate::session::{Session, READ_CHUNK_SIZE};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Longest line the client prints before remote output starts. An unfinished
/// line past this length is remote output.
const MAX_PREAMBLE_LINE: usize = 512;

/// How long a repeated prompt may sit unanswered before it counts as a refusal.
const REPROMPT_GRACE: Duration = Duration::from_secs(1);

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelayEnd {
    /// Zero-length read
    Eof,
    /// Read from the session failed
    ReadError,
    /// Writing to the sink failed
    SinkClosed,
    /// The client refused the credential
    Rejected,
}

/// Totals for one relay.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RelaySummary {
    pub end: RelayEnd,
    pub bytes: u64,
}

/// Lenient UTF-8 decoder for a chunked byte stream.
///
/// Invalid sequences become U+FFFD. An incomplete sequence at the end of a
/// chunk is held back and completed by the next one.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let consumed = self.pending.len() - rest.len();
        self.pending.drain(..consumed);
        out
    }

    /// Flush a sequence left incomplete when the stream ended.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// Watches what the client prints between the credential and the first line
/// of remote output.
///
/// A refusal is either a complete line carrying a rejection marker, at the
/// start of the line or after a `user@host: ` prefix, or an unfinished line
/// ending in the prompt that gets no further output. The first other non-blank
/// line is remote output and disarms the scanner for the rest of the relay.
pub(crate) struct RejectionScanner {
    prompt: Box<dyn Matcher>,
    markers: Vec<Box<dyn Matcher>>,
    line: Vec<u8>,
    armed: bool,
}

impl RejectionScanner {
    pub fn new(prompt: &Pattern, markers: &[Pattern]) -> Result<Self, PatternError> {
        let markers = markers
            .iter()
            .map(Pattern::to_matcher)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            prompt: prompt.to_matcher()?,
            markers,
            line: Vec::new(),
            armed: true,
        })
    }

    /// Feed the next chunk; returns the refusal line once it is complete.
    pub fn observe(&mut self, chunk: &[u8]) -> Option<String> {
        for &byte in chunk {
            if !self.armed {
                return None;
            }

            if byte != b'\n' {
                self.line.push(byte);
                if self.line.len() > MAX_PREAMBLE_LINE {
                    self.disarm();
                }
                continue;
            }

            let line = std::mem::take(&mut self.line);
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            if self.is_refusal(line) {
                return Some(String::from_utf8_lossy(line).into_owned());
            }
            self.disarm();
        }
        None
    }

    /// Whether the output so far ends in an unanswered prompt.
    pub fn awaiting_input(&self) -> bool {
        self.armed && self.prompt.find(&self.line).is_some()
    }

    fn is_refusal(&self, line: &[u8]) -> bool {
        self.markers.iter().any(|marker| {
            marker
                .find(line)
                .is_some_and(|m| is_client_prefix(&line[..m.start]))
        })
    }

    fn disarm(&mut self) {
        trace!("remote output started, refusal scan off");
        self.armed = false;
        self.line = Vec::new();
    }
}

/// Empty, or the `user@host: ` the client puts before its own diagnostics.
fn is_client_prefix(prefix: &[u8]) -> bool {
    match prefix.strip_suffix(b": ") {
        Some(origin) => !origin.is_empty() && !origin.iter().any(u8::is_ascii_whitespace),
        None => prefix.is_empty(),
    }
}

/// Copy session output to `out` until end of stream, a read error, a sink
/// error, or a refusal.
///
/// The chunk completing a refusal line is still written before stopping.
pub(crate) async fn relay<W: Write>(
    session: &mut Session,
    out: &mut W,
    scanner: &mut RejectionScanner,
) -> RelaySummary {
    let mut decoder = Utf8Decoder::default();
    let mut read_buf = vec![0u8; READ_CHUNK_SIZE];
    let mut bytes = 0u64;

    let end = loop {
        let grace = scanner.awaiting_input().then_some(REPROMPT_GRACE);
        let n = match session.read_chunk(&mut read_buf, grace).await {
            Ok(0) => break RelayEnd::Eof,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                warn!("client asked for the password again");
                break RelayEnd::Rejected;
            }
            Err(e) => {
                debug!(error = %e, "read failed during passthrough");
                break RelayEnd::ReadError;
            }
        };

        bytes += n as u64;
        trace!(bytes = n, "relaying output");

        let chunk = &read_buf[..n];
        let text = decoder.decode(chunk);
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            debug!(error = %e, "output sink closed");
            break RelayEnd::SinkClosed;
        }

        if let Some(line) = scanner.observe(chunk) {
            warn!(%line, "client refused the credential");
            break RelayEnd::Rejected;
        }
    };

    let tail = decoder.finish();
    if !tail.is_empty() && end != RelayEnd::SinkClosed {
        if let Err(e) = out.write_all(tail.as_bytes()).and_then(|_| out.flush()) {
            debug!(error = %e, "output sink closed before the final bytes");
        }
    }

    RelaySummary { end, bytes }
}
