//! logprobe: answer an SSH password prompt and relay one remote command
//!
//! logprobe starts an SSH client on a pseudo-terminal, so the client believes
//! it is interactive and asks for a password. It waits for the prompt, types
//! the credential, and copies whatever the remote command prints to a local
//! sink. By default the remote command is a grep for the latest `local.ERROR`
//! entries of an application log.
//!
//! # Features
//!
//! - **PTY sessions**: spawned with `portable-pty` and an explicit argument vector
//! - **Prompt detection**: case-insensitive search with a hard deadline
//! - **Lenient passthrough**: invalid UTF-8 replaced, split sequences reassembled
//! - **Rejection check**: a refused credential ends the run as a failure
//!   instead of being relayed as output
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use logprobe::{ProbeConfig, Secret};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProbeConfig::new(Secret::new(std::env::var("LOGPROBE_PASSWORD")?))
//!         .target("deploy@10.0.0.5")
//!         .remote_command("tail -n 20 /var/log/app.log");
//!
//!     let report = logprobe::run(&config, &mut std::io::stdout()).await?;
//!     if !report.is_success() {
//!         eprintln!("probe failed: {:?}", report.phase);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Lower-level API
//!
//! [`Session`] exposes the pieces individually: spawn a program under a pty,
//! wait for a [`Pattern`] with [`Session::read_until`], write with
//! [`Session::send_line`]. [`SessionBuilder::attach`] runs the same code over
//! any blocking byte streams.
//!
//! ```rust,no_run
//! use logprobe::{Pattern, Session};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::builder()
//!     .timeout(Duration::from_secs(20))
//!     .spawn("ssh", ["-o", "StrictHostKeyChecking=no", "user@host", "uptime"])?;
//!
//! let detection = session.read_until(&Pattern::exact_ignore_case("password:")).await?;
//! if detection.is_match() {
//!     session.send_line("secret").await?;
//! } else {
//!     println!("Could not find password prompt. Output: {}", detection.text());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod buffer;
mod config;
mod pattern;
mod probe;
mod result;
mod session;

// Public API exports
pub use config::{
    HostKeyPolicy, ProbeConfig, Secret, DEFAULT_PROMPT, DEFAULT_REMOTE_COMMAND,
    DEFAULT_SSH_PROGRAM, DEFAULT_TARGET,
};
pub use pattern::{Match, Matcher, Pattern};
pub use probe::{run, FailureKind, Phase, Probe};
pub use result::{DetectOutcome, Detection, PatternError, ProbeError, ProbeReport};
pub use session::{Session, SessionBuilder};

// Re-export commonly used types
pub use portable_pty::ExitStatus;
