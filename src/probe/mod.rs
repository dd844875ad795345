//! The probe: wait for the password prompt, answer it, relay the output.

mod relay;

use crate::config::{ProbeConfig, Secret};
use crate::pattern::Pattern;
use crate::result::{DetectOutcome, Detection, ProbeError, ProbeReport};
use crate::session::Session;
use relay::{RejectionScanner, RelayEnd};
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a probe run stands.
///
/// ```text
/// AwaitingPrompt --match--> Authenticating --> Streaming --> Done
///       |                                          |
///       +--timeout/eof/read error--> Failed        +--refusal--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading output until the prompt appears
    AwaitingPrompt,
    /// Prompt seen, sending the credential
    Authenticating,
    /// Relaying remote output to the sink
    Streaming,
    /// Output relayed until the stream ended
    Done,
    /// The run stopped early
    Failed(FailureKind),
}

/// Why a run ended in [`Phase::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The prompt never appeared; carries how detection ended.
    PromptNotFound(DetectOutcome),
    /// The client reported that the credential was refused.
    AuthRejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::PromptNotFound(DetectOutcome::Timeout) => {
                f.write_str("password prompt not seen before the timeout")
            }
            FailureKind::PromptNotFound(DetectOutcome::ReadError) => {
                f.write_str("terminal read failed before the password prompt")
            }
            FailureKind::PromptNotFound(_) => {
                f.write_str("session closed before the password prompt")
            }
            FailureKind::AuthRejected => f.write_str("credential rejected by the remote host"),
        }
    }
}

/// Drives one session through the [`Phase`] sequence.
///
/// # Examples
///
/// ```
/// use logprobe::{Phase, Probe, ProbeConfig, Secret, Session};
/// use std::io::Cursor;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let config = ProbeConfig::new(Secret::new("hunter2")).settle_delay(Duration::ZERO);
/// let mut probe = Probe::new(&config).unwrap();
///
/// // Any blocking byte stream can stand in for the terminal
/// let terminal = Cursor::new(b"forge@host's password: ".to_vec());
/// let mut session = Session::builder().attach(terminal, Vec::<u8>::new());
///
/// let mut out = Vec::new();
/// let report = probe.run(&mut session, &mut out).await.unwrap();
/// assert_eq!(report.phase, Phase::Done);
/// assert!(report.credential_sent);
/// # });
/// ```
pub struct Probe {
    prompt: Pattern,
    rejection: Vec<Pattern>,
    credential: Secret,
    settle_delay: Duration,
    phase: Phase,
}

impl Probe {
    /// Build a probe from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or a pattern is
    /// invalid.
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        config.validate()?;

        let prompt = config.prompt_pattern()?;
        let rejection = config.rejection_patterns();
        // Surface matcher errors here rather than mid-run
        RejectionScanner::new(&prompt, &rejection)?;

        Ok(Self {
            prompt,
            rejection,
            credential: config.credential().clone(),
            settle_delay: config.settle_delay,
            phase: Phase::AwaitingPrompt,
        })
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the whole sequence on `session`, relaying output into `out`.
    ///
    /// Prompt-not-found and rejected credentials are reported through the
    /// returned [`ProbeReport`], not as errors. The credential is written at
    /// most once, and only after the prompt matched.
    pub async fn run<W: Write>(
        &mut self,
        session: &mut Session,
        out: &mut W,
    ) -> Result<ProbeReport, ProbeError> {
        self.phase = Phase::AwaitingPrompt;
        let mut scanner = RejectionScanner::new(&self.prompt, &self.rejection)?;

        let detection = session.read_until(&self.prompt).await?;
        if !detection.is_match() {
            self.transition(Phase::Failed(FailureKind::PromptNotFound(detection.outcome)));
            return Ok(self.report(detection, false, 0));
        }

        self.transition(Phase::Authenticating);
        let credential_sent = match session.send_line(self.credential.expose()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to send credential");
                false
            }
        };

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        self.transition(Phase::Streaming);
        let summary = relay::relay(session, out, &mut scanner).await;
        debug!(end = ?summary.end, bytes = summary.bytes, "passthrough finished");

        let next = match summary.end {
            RelayEnd::Rejected => Phase::Failed(FailureKind::AuthRejected),
            RelayEnd::Eof | RelayEnd::ReadError | RelayEnd::SinkClosed => Phase::Done,
        };
        self.transition(next);

        Ok(self.report(detection, credential_sent, summary.bytes))
    }

    fn transition(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "phase change");
        self.phase = next;
    }

    fn report(
        &self,
        detection: Detection,
        credential_sent: bool,
        relayed_bytes: u64,
    ) -> ProbeReport {
        ProbeReport {
            phase: self.phase,
            detection,
            credential_sent,
            relayed_bytes,
        }
    }
}

/// Launch the configured client under a pty and run a [`Probe`] on it.
///
/// On failure the client is killed; on success it is left to exit on its own
/// and its status is only logged.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, or the pty or client
/// cannot be started.
///
/// # Examples
///
/// ```no_run
/// use logprobe::{ProbeConfig, Secret};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ProbeConfig::new(Secret::new(std::env::var("LOGPROBE_PASSWORD")?));
/// let report = logprobe::run(&config, &mut std::io::stdout()).await?;
///
/// if let Some(failure) = report.failure() {
///     eprintln!("{failure}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run<W: Write>(config: &ProbeConfig, out: &mut W) -> Result<ProbeReport, ProbeError> {
    let mut probe = Probe::new(config)?;

    let mut builder = Session::builder()
        .timeout(config.prompt_timeout)
        .strip_ansi(config.strip_ansi);
    if let Some(size) = config.max_buffer_size {
        builder = builder.max_buffer_size(size);
    }
    let mut session = builder.spawn(config.program(), config.client_args())?;

    info!(host = config.target_str(), program = config.program(), "session started");

    let report = probe.run(&mut session, out).await?;

    if report.is_success() {
        match session.exit_status() {
            Ok(Some(status)) => debug!(code = status.exit_code(), "client exited"),
            Ok(None) => debug!("client still running after end of output"),
            Err(e) => debug!(error = %e, "client status unavailable"),
        }
    } else if let Err(e) = session.terminate() {
        debug!(error = %e, "failed to terminate client");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl SharedWriter {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn probe() -> Probe {
        let config = ProbeConfig::new(Secret::new("s3cret")).settle_delay(Duration::ZERO);
        Probe::new(&config).unwrap()
    }

    #[test]
    fn test_new_rejects_missing_credential() {
        let result = Probe::new(&ProbeConfig::new(Secret::default()));
        assert!(matches!(result, Err(ProbeError::Config(_))));
    }

    #[test]
    fn test_new_starts_awaiting_prompt() {
        assert_eq!(probe().phase(), Phase::AwaitingPrompt);
    }

    #[tokio::test]
    async fn test_match_sends_credential_once_and_streams() {
        let sent = SharedWriter::default();
        let terminal = Cursor::new(b"Password: \r\nline one\r\nline two\r\n".to_vec());
        let mut session = Session::builder().attach(terminal, sent.clone());
        let mut probe = probe();
        let mut out = Vec::new();

        let report = probe.run(&mut session, &mut out).await.unwrap();

        assert_eq!(probe.phase(), Phase::Done);
        assert!(report.credential_sent);
        assert_eq!(sent.contents(), b"s3cret\n");
        // everything arrived in the detection read, nothing left to relay
        assert!(report.detection.text().contains("line two"));
        assert!(out.is_empty());
        assert_eq!(report.relayed_bytes, 0);
    }

    #[tokio::test]
    async fn test_no_prompt_fails_without_credential() {
        let sent = SharedWriter::default();
        let terminal =
            Cursor::new(b"ssh: connect to host 10.0.0.1 port 22: Connection refused\r\n".to_vec());
        let mut session = Session::builder().attach(terminal, sent.clone());
        let mut probe = probe();
        let mut out = Vec::new();

        let report = probe.run(&mut session, &mut out).await.unwrap();

        assert_eq!(
            report.phase,
            Phase::Failed(FailureKind::PromptNotFound(DetectOutcome::Eof))
        );
        assert!(!report.credential_sent);
        assert!(sent.contents().is_empty());
        assert!(report.detection.text().contains("Connection refused"));
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            FailureKind::PromptNotFound(DetectOutcome::Timeout).to_string(),
            "password prompt not seen before the timeout"
        );
        assert_eq!(
            FailureKind::AuthRejected.to_string(),
            "credential rejected by the remote host"
        );
    }
}
