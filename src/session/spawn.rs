//! Process spawning utilities

use crate::result::ProbeError;
use portable_pty::CommandBuilder;
use std::ffi::OsStr;

/// Build the command for the pty slave from an explicit argument vector
pub fn build_command<I, S>(
    program: &str,
    args: I,
    env: &[(String, String)],
) -> Result<CommandBuilder, ProbeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if program.trim().is_empty() {
        return Err(ProbeError::SpawnError("Empty command".to_string()));
    }

    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);
    for (key, value) in env {
        cmd.env(key, value);
    }
    if let Ok(dir) = std::env::current_dir() {
        cmd.cwd(dir);
    }

    Ok(cmd)
}

/// Check if a child process is still alive
pub fn is_alive(
    child: &mut Box<dyn portable_pty::Child + Send + Sync>,
) -> Result<bool, ProbeError> {
    match child.try_wait() {
        Ok(Some(_)) => Ok(false), // Process exited
        Ok(None) => Ok(true),     // Still running
        Err(e) => Err(ProbeError::IoError(e)),
    }
}
