//! Session builder for configuration

use crate::result::ProbeError;
use crate::session::{spawn, Session, READ_CHUNK_SIZE};
use portable_pty::{native_pty_system, PtySize};
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default timeout for prompt detection (in seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Default PTY rows
const DEFAULT_PTY_ROWS: u16 = 24;

/// Default PTY columns
const DEFAULT_PTY_COLS: u16 = 80;

/// Builder for configuring and spawning sessions.
///
/// # Defaults
///
/// - Timeout: 20 seconds
/// - Capture buffer: unbounded
/// - ANSI stripping: disabled
/// - PTY size: 24 rows × 80 columns
///
/// # Examples
///
/// ```no_run
/// use logprobe::Session;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(10))
///     .pty_size(40, 120)
///     .spawn("ssh", ["-o", "StrictHostKeyChecking=no", "user@example.com", "uptime"])?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    timeout: Option<Duration>,
    max_buffer_size: Option<usize>,
    strip_ansi: bool,
    pty_size: PtySize,
    env: Vec<(String, String)>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    pub fn new() -> Self {
        Self {
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_buffer_size: None,
            strip_ansi: false,
            pty_size: PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
            env: Vec::new(),
        }
    }

    /// Set the deadline for [`Session::read_until`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable the deadline (wait until match or end of stream).
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Bound the capture buffer of [`Session::read_until`] in bytes.
    ///
    /// Sizes below one read (4096 bytes) are raised to it, so a prompt split
    /// across two reads still survives trimming.
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = Some(size.max(READ_CHUNK_SIZE));
        self
    }

    /// Enable or disable ANSI escape sequence stripping before matching.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    /// Set PTY (terminal) size.
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self
    }

    /// Add an environment variable for the spawned process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Spawn `program` with `args` on a new pseudo-terminal.
    ///
    /// Each element of `args` reaches the child as exactly one argument; nothing
    /// is split on whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The program name is empty
    /// - The PTY cannot be created
    /// - The process cannot be spawned
    pub fn spawn<I, S>(self, program: &str, args: I) -> Result<Session, ProbeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let cmd = spawn::build_command(program, args, &self.env)?;

        let pty_system = native_pty_system();
        let pty_pair = pty_system
            .openpty(self.pty_size)
            .map_err(|e| ProbeError::PtyError(e.to_string()))?;

        let child = pty_pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ProbeError::SpawnError(e.to_string()))?;

        // Only the child may hold the slave, otherwise the master never
        // reports end of stream after the child exits.
        drop(pty_pair.slave);

        let reader = pty_pair
            .master
            .try_clone_reader()
            .map_err(|e| ProbeError::PtyError(e.to_string()))?;

        let writer = pty_pair
            .master
            .take_writer()
            .map_err(|e| ProbeError::PtyError(e.to_string()))?;

        debug!(program, pid = ?child.process_id(), "spawned under pty");

        Ok(Session {
            _master: Some(pty_pair.master),
            child: Some(child),
            master_reader: Arc::new(Mutex::new(reader)),
            master_writer: Arc::new(Mutex::new(writer)),
            timeout: self.timeout,
            max_buffer_size: self.max_buffer_size,
            strip_ansi: self.strip_ansi,
            eof_reached: false,
        })
    }

    /// Build a session over existing blocking streams instead of a new pty.
    ///
    /// The session has no child process: [`Session::is_alive`] and
    /// [`Session::wait`] return [`ProbeError::ProcessExited`].
    ///
    /// # Examples
    ///
    /// ```
    /// use logprobe::{Pattern, Session};
    /// use std::io::Cursor;
    ///
    /// # tokio_test::block_on(async {
    /// let reader = Cursor::new(b"Password for forge@host: ".to_vec());
    /// let mut session = Session::builder().attach(reader, Vec::<u8>::new());
    ///
    /// let detection = session
    ///     .read_until(&Pattern::exact_ignore_case("password:"))
    ///     .await
    ///     .unwrap();
    /// assert!(detection.is_match());
    /// # });
    /// ```
    pub fn attach<R, W>(self, reader: R, writer: W) -> Session
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Session {
            _master: None,
            child: None,
            master_reader: Arc::new(Mutex::new(Box::new(reader))),
            master_writer: Arc::new(Mutex::new(Box::new(writer))),
            timeout: self.timeout,
            max_buffer_size: self.max_buffer_size,
            strip_ansi: self.strip_ansi,
            eof_reached: false,
        }
    }
}
