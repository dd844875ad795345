//! Error types for logprobe

use thiserror::Error;

/// Errors that can stop a probe run.
///
/// A missing password prompt is not an error: it is reported through
/// [`Detection`](crate::Detection) and [`ProbeReport`](crate::ProbeReport).
/// `ProbeError` covers the conditions under which the run cannot start or the
/// caller misused the session.
///
/// # Examples
///
/// ```no_run
/// use logprobe::{ProbeError, Session};
///
/// match Session::builder().spawn("definitely-not-installed", ["-v"]) {
///     Ok(_) => println!("spawned"),
///     Err(ProbeError::SpawnError(reason)) => eprintln!("cannot launch: {reason}"),
///     Err(e) => eprintln!("other failure: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Invalid configuration.
    ///
    /// Returned by [`ProbeConfig::validate`](crate::ProbeConfig::validate) when a
    /// required parameter is empty.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid pattern.
    #[error("Invalid pattern: {0}")]
    PatternError(#[from] PatternError),

    /// I/O error.
    ///
    /// Returned when an underlying I/O operation fails outside the read loops,
    /// for example while waiting on the child process.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// PTY error.
    ///
    /// Returned when the pseudo-terminal pair cannot be created or its master
    /// side cannot be cloned.
    #[error("PTY error: {0}")]
    PtyError(String),

    /// Process spawning error.
    ///
    /// Returned when the client program cannot be started (not found,
    /// permission denied, empty program name).
    #[error("Failed to spawn process: {0}")]
    SpawnError(String),

    /// No child process is attached to the session, or it was already waited on.
    #[error("Process has already exited")]
    ProcessExited,
}

/// Errors related to pattern creation.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex pattern.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Empty pattern.
    #[error("Pattern cannot be empty")]
    EmptyPattern,
}
