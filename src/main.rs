//! Command-line entry point: run the log probe and relay its output to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use logprobe::{
    FailureKind, HostKeyPolicy, Phase, ProbeConfig, ProbeReport, Secret, DEFAULT_PROMPT,
    DEFAULT_REMOTE_COMMAND, DEFAULT_SSH_PROGRAM, DEFAULT_TARGET,
};
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "logprobe")]
#[command(author, version, about = "Log in over SSH with a password and print one remote log query", long_about = None)]
struct Args {
    /// SSH target as user@host
    #[arg(long, env = "LOGPROBE_TARGET", default_value = DEFAULT_TARGET)]
    target: String,

    /// Command run on the remote host
    #[arg(long, env = "LOGPROBE_COMMAND", default_value = DEFAULT_REMOTE_COMMAND)]
    command: String,

    /// Password sent when the prompt appears
    #[arg(long, env = "LOGPROBE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// SSH client executable
    #[arg(long, default_value = DEFAULT_SSH_PROGRAM)]
    ssh: String,

    /// StrictHostKeyChecking value: no, accept-new or yes
    #[arg(long, default_value = "no")]
    host_key_checking: HostKeyPolicy,

    /// Prompt text to answer (case-insensitive)
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Regular expression recognising the prompt, instead of --prompt
    #[arg(long)]
    prompt_regex: Option<String>,

    /// Seconds to wait for the prompt
    #[arg(long, default_value_t = 20)]
    timeout: u64,

    /// Seconds to wait after sending the password before relaying output
    #[arg(long, default_value_t = 2)]
    settle: u64,

    /// Remove ANSI escape sequences before looking for the prompt
    #[arg(long)]
    strip_ansi: bool,
}

impl Args {
    fn into_config(self) -> Result<ProbeConfig> {
        let password = self
            .password
            .context("no password given: set LOGPROBE_PASSWORD or pass --password")?;

        let mut config = ProbeConfig::new(Secret::from(password))
            .target(self.target)
            .remote_command(self.command)
            .ssh_program(self.ssh)
            .host_key_policy(self.host_key_checking)
            .prompt(self.prompt)
            .prompt_timeout(Duration::from_secs(self.timeout))
            .settle_delay(Duration::from_secs(self.settle))
            .strip_ansi(self.strip_ansi);

        if let Some(regex) = self.prompt_regex {
            config = config.prompt_regex(regex);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Logs go to stderr so stdout carries only remote output.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LOGPROBE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print the outcome of a run and choose the exit code.
///
/// Remote output has already gone to `out` during the run. A missing prompt is
/// reported on `out` and still ends normally; a refused credential is reported
/// on `err` and fails.
fn report_outcome<O, E>(report: &ProbeReport, out: &mut O, err: &mut E) -> io::Result<u8>
where
    O: Write,
    E: Write,
{
    match report.phase {
        Phase::Failed(FailureKind::PromptNotFound(_)) => {
            writeln!(
                out,
                "Could not find password prompt. Output: {}",
                report.detection.text()
            )?;
            out.flush()?;
            Ok(0)
        }
        Phase::Failed(failure @ FailureKind::AuthRejected) => {
            out.flush()?;
            writeln!(err, "logprobe: {failure}")?;
            Ok(1)
        }
        _ => Ok(0),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let config = Args::parse().into_config()?;
    let mut stdout = io::stdout();

    let report = logprobe::run(&config, &mut stdout).await.with_context(|| {
        format!("failed to start {} for {}", config.program(), config.target_str())
    })?;

    let code = report_outcome(&report, &mut stdout, &mut io::stderr())
        .context("failed to write the run report")?;
    Ok(ExitCode::from(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use logprobe::{Probe, Session};
    use std::collections::VecDeque;
    use std::io::Read;

    /// Hands out one chunk per read.
    struct Chunks(VecDeque<Vec<u8>>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(chunk) = self.0.pop_front() else {
                return Ok(0);
            };
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    fn run_over(chunks: &[&[u8]]) -> ProbeReport {
        let terminal = Chunks(chunks.iter().map(|c| c.to_vec()).collect());
        let config = ProbeConfig::new(Secret::new("hunter2")).settle_delay(Duration::ZERO);
        let mut probe = Probe::new(&config).unwrap();
        let mut session = Session::builder().attach(terminal, Vec::<u8>::new());

        tokio_test::block_on(probe.run(&mut session, &mut Vec::<u8>::new())).unwrap()
    }

    fn outcome(report: &ProbeReport) -> (u8, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = report_outcome(report, &mut out, &mut err).unwrap();
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_success_prints_nothing_more() {
        let report = run_over(&[b"forge@host's password: ", b"\r\nlocal.ERROR: boom\r\n"]);

        assert_eq!(outcome(&report), (0, String::new(), String::new()));
    }

    #[test]
    fn test_missing_prompt_prints_captured_output() {
        let report = run_over(&[b"ssh: connect to host 10.0.0.1 port 22: ", b"refused \xff\r\n"]);

        let (code, out, err) = outcome(&report);

        assert_eq!(code, 0);
        assert_eq!(
            out,
            "Could not find password prompt. Output: \
             ssh: connect to host 10.0.0.1 port 22: refused \u{FFFD}\r\n\n"
        );
        assert!(err.is_empty());
    }

    #[test]
    fn test_missing_prompt_with_nothing_captured() {
        let report = run_over(&[]);

        let (code, out, _) = outcome(&report);

        assert_eq!(code, 0);
        assert_eq!(out, "Could not find password prompt. Output: \n");
    }

    #[test]
    fn test_refused_credential_fails() {
        let report = run_over(&[
            b"forge@host's password: ",
            b"\r\nPermission denied, please try again.\r\n",
        ]);

        let (code, out, err) = outcome(&report);

        assert_eq!(code, 1);
        assert!(out.is_empty());
        assert_eq!(err, "logprobe: credential rejected by the remote host\n");
    }
}
