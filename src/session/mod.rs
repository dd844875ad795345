//! Session management for PTY-based process automation

mod builder;
mod spawn;

pub use builder::SessionBuilder;

use crate::buffer::BufferManager;
use crate::pattern::Pattern;
use crate::result::{DetectOutcome, Detection, ProbeError};
use portable_pty::{Child, ChildKiller, ExitStatus, MasterPty};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Size of a single read from the pty master
pub(crate) const READ_CHUNK_SIZE: usize = 4096;

/// A child process attached to a pseudo-terminal, or any pair of blocking
/// byte streams standing in for one.
///
/// Reads and writes are blocking calls executed on tokio's blocking pool, so a
/// deadline can be placed on a read without making the stream non-blocking.
///
/// # Examples
///
/// ```no_run
/// use logprobe::{Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::builder()
///     .timeout(Duration::from_secs(20))
///     .spawn("ssh", ["user@example.com", "uptime"])?;
///
/// let detection = session.read_until(&Pattern::exact_ignore_case("password:")).await?;
/// if detection.is_match() {
///     session.send_line("secret").await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Session {
    _master: Option<Box<dyn MasterPty + Send>>,
    child: Option<Box<dyn Child + Send + Sync>>,
    master_reader: Arc<Mutex<Box<dyn Read + Send>>>,
    master_writer: Arc<Mutex<Box<dyn Write + Send>>>,
    timeout: Option<Duration>,
    max_buffer_size: Option<usize>,
    strip_ansi: bool,
    eof_reached: bool,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Spawn `program` with `args` using the default configuration.
    ///
    /// Shorthand for `Session::builder().spawn(program, args)`.
    pub fn spawn<I, S>(program: &str, args: I) -> Result<Self, ProbeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        SessionBuilder::new().spawn(program, args)
    }

    /// Whether a read on this session has already returned end of stream.
    pub fn is_eof(&self) -> bool {
        self.eof_reached
    }

    /// Read until `pattern` appears, the deadline passes, or the stream ends.
    ///
    /// Every call starts with an empty capture buffer and returns whatever it
    /// captured, matched or not. Nothing is dropped unless the builder set a
    /// [`max_buffer_size`](SessionBuilder::max_buffer_size), and even then
    /// each read is searched before the buffer is trimmed. Read errors end the loop with
    /// [`DetectOutcome::ReadError`]; they are not retried. A session that
    /// already reached end of stream returns an empty [`DetectOutcome::Eof`]
    /// detection without blocking.
    ///
    /// Each read is bounded by the time remaining, so a stream that neither
    /// closes nor matches returns shortly after the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error only if `pattern` cannot be compiled.
    pub async fn read_until(&mut self, pattern: &Pattern) -> Result<Detection, ProbeError> {
        let matcher = pattern.to_matcher()?;
        let mut buffer = match self.max_buffer_size {
            Some(max_size) => BufferManager::new(max_size, self.strip_ansi),
            None => BufferManager::unbounded(self.strip_ansi),
        };

        if self.eof_reached {
            return Ok(Detection::unmatched(buffer.into_bytes(), DetectOutcome::Eof));
        }

        let mut read_buf = vec![0u8; READ_CHUNK_SIZE];
        let start_time = Instant::now();

        loop {
            let remaining = match self.timeout {
                Some(timeout) => {
                    let elapsed = start_time.elapsed();
                    if elapsed >= timeout {
                        debug!(?timeout, captured = buffer.len(), "prompt not seen before deadline");
                        return Ok(Detection::unmatched(
                            buffer.into_bytes(),
                            DetectOutcome::Timeout,
                        ));
                    }
                    Some(timeout - elapsed)
                }
                None => None,
            };

            match self.read_chunk(&mut read_buf, remaining).await {
                Ok(0) => {
                    debug!(captured = buffer.len(), "stream closed before prompt");
                    return Ok(Detection::unmatched(buffer.into_bytes(), DetectOutcome::Eof));
                }
                Ok(n) => {
                    buffer.append(&read_buf[..n]);
                    trace!(bytes = n, captured = buffer.len(), "read during prompt detection");

                    if let Some(m) = matcher.find(buffer.as_bytes()) {
                        debug!(%pattern, start = m.start, "prompt detected");
                        return Ok(Detection::matched(buffer.into_bytes(), m.start, m.end));
                    }

                    if matcher.partial_match(buffer.as_bytes()) {
                        trace!(%pattern, "buffer ends with a partial prompt");
                    }

                    buffer.enforce_limit();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    debug!(captured = buffer.len(), "prompt not seen before deadline");
                    return Ok(Detection::unmatched(
                        buffer.into_bytes(),
                        DetectOutcome::Timeout,
                    ));
                }
                Err(e) => {
                    debug!(error = %e, empty = buffer.is_empty(), "read failed during prompt detection");
                    return Ok(Detection::unmatched(
                        buffer.into_bytes(),
                        DetectOutcome::ReadError,
                    ));
                }
            }
        }
    }

    /// Perform one blocking read, bounded by `timeout` when given.
    ///
    /// Returns `Ok(0)` at end of stream and from then on. A read that exceeds
    /// the deadline fails with [`io::ErrorKind::TimedOut`]; the abandoned read
    /// keeps the reader locked until it completes, so a timed-out session
    /// should not be read from again.
    pub async fn read_chunk(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> io::Result<usize> {
        if self.eof_reached {
            return Ok(0);
        }

        let reader = self.master_reader.clone();
        let buf_len = buf.len();

        let read_future = tokio::task::spawn_blocking(move || {
            let mut reader = reader.blocking_lock();
            let mut temp_buf = vec![0u8; buf_len];
            reader.read(&mut temp_buf).map(|n| (n, temp_buf))
        });

        let result = if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, read_future)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Read timeout"))??
        } else {
            read_future.await.map_err(io::Error::other)?
        }?;

        let (n, temp_buf) = result;
        if n == 0 {
            self.eof_reached = true;
        }
        buf[..n].copy_from_slice(&temp_buf[..n]);
        Ok(n)
    }

    /// Send raw bytes to the process and flush.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ProbeError> {
        let writer = self.master_writer.clone();
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut writer = writer.blocking_lock();
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(|e| ProbeError::IoError(io::Error::other(e)))??;

        Ok(())
    }

    /// Send `line` followed by `\n` as a single write.
    pub async fn send_line(&mut self, line: &str) -> Result<(), ProbeError> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.send(&data).await
    }

    /// Check if the process is still alive.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::ProcessExited`] when there is no child (attached
    /// session, or already waited on).
    pub fn is_alive(&mut self) -> Result<bool, ProbeError> {
        match &mut self.child {
            Some(child) => spawn::is_alive(child),
            None => Err(ProbeError::ProcessExited),
        }
    }

    /// Exit status of the child if it has already exited, without blocking.
    pub fn exit_status(&mut self) -> Result<Option<ExitStatus>, ProbeError> {
        match &mut self.child {
            Some(child) => Ok(child.try_wait()?),
            None => Err(ProbeError::ProcessExited),
        }
    }

    /// Kill the child process if one is attached and still running.
    ///
    /// Closing the child's side of the pty also releases a blocked read.
    pub fn terminate(&mut self) -> Result<(), ProbeError> {
        let Some(child) = &mut self.child else {
            return Ok(());
        };

        if child.try_wait()?.is_none() {
            debug!(pid = ?child.process_id(), "terminating child");
            child.kill()?;
        }
        Ok(())
    }

    /// Wait for the process to exit and return its exit status.
    ///
    /// Consumes the child handle; later calls fail with
    /// [`ProbeError::ProcessExited`].
    pub async fn wait(&mut self) -> Result<ExitStatus, ProbeError> {
        let mut child = self.child.take().ok_or(ProbeError::ProcessExited)?;

        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|e| ProbeError::IoError(io::Error::other(e)))??;

        Ok(status)
    }
}
