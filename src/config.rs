//! Probe configuration

use crate::pattern::Pattern;
use crate::result::ProbeError;
use crate::session::READ_CHUNK_SIZE;
use std::fmt;
use std::time::Duration;

/// Remote-shell client launched under the pseudo-terminal
pub const DEFAULT_SSH_PROGRAM: &str = "ssh";

/// `user@host` the client connects to
pub const DEFAULT_TARGET: &str = "forge@13.53.205.215";

/// Command executed on the remote host
pub const DEFAULT_REMOTE_COMMAND: &str = "grep 'local.ERROR' /home/forge/egi-hub.13.53.205.215.sslip.io/current/backend/storage/logs/laravel.log | tail -n 10";

/// Prompt answered with the credential (matched ignoring ASCII case)
pub const DEFAULT_PROMPT: &str = "password:";

/// How long to wait for the prompt (in seconds)
const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 20;

/// Pause between sending the credential and relaying output (in seconds)
const DEFAULT_SETTLE_DELAY_SECS: u64 = 2;

/// Client messages that mean the credential was refused
const DEFAULT_REJECTION_MARKERS: [&str; 2] = [
    "permission denied, please try again",
    "permission denied (",
];

/// Credential string whose `Debug` and `Display` never reveal the value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The credential itself
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the credential is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Value passed to the client as `-o StrictHostKeyChecking=<value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key without verification
    #[default]
    No,
    /// Accept unknown hosts, refuse changed keys
    AcceptNew,
    /// Refuse hosts missing from `known_hosts`
    Yes,
}

impl HostKeyPolicy {
    /// The option value understood by OpenSSH
    pub fn as_str(self) -> &'static str {
        match self {
            HostKeyPolicy::No => "no",
            HostKeyPolicy::AcceptNew => "accept-new",
            HostKeyPolicy::Yes => "yes",
        }
    }
}

impl std::str::FromStr for HostKeyPolicy {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "no" | "off" => Ok(HostKeyPolicy::No),
            "accept-new" => Ok(HostKeyPolicy::AcceptNew),
            "yes" | "ask" => Ok(HostKeyPolicy::Yes),
            other => Err(ProbeError::Config(format!(
                "unknown host key policy '{other}' (expected no, accept-new or yes)"
            ))),
        }
    }
}

/// Everything a probe run needs.
///
/// Every field except the credential has a built-in default, so
/// `ProbeConfig::new(secret)` reproduces the stock diagnostic: grep the last
/// ten `local.ERROR` lines of the application log on the forge host.
///
/// # Examples
///
/// ```
/// use logprobe::{ProbeConfig, Secret};
/// use std::time::Duration;
///
/// let config = ProbeConfig::new(Secret::new("hunter2"))
///     .target("deploy@10.0.0.5")
///     .remote_command("tail -n 50 /var/log/syslog")
///     .prompt_timeout(Duration::from_secs(5));
///
/// assert_eq!(
///     config.client_args(),
///     ["-o", "StrictHostKeyChecking=no", "deploy@10.0.0.5", "tail -n 50 /var/log/syslog"]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub(crate) ssh_program: String,
    pub(crate) host_key_policy: HostKeyPolicy,
    pub(crate) target: String,
    pub(crate) remote_command: String,
    pub(crate) credential: Secret,
    pub(crate) prompt: String,
    pub(crate) prompt_regex: Option<String>,
    pub(crate) rejection_markers: Vec<String>,
    pub(crate) prompt_timeout: Duration,
    pub(crate) settle_delay: Duration,
    pub(crate) strip_ansi: bool,
    pub(crate) max_buffer_size: Option<usize>,
}

impl ProbeConfig {
    /// Create a configuration with default parameters and the given credential.
    pub fn new(credential: Secret) -> Self {
        Self {
            ssh_program: DEFAULT_SSH_PROGRAM.to_string(),
            host_key_policy: HostKeyPolicy::default(),
            target: DEFAULT_TARGET.to_string(),
            remote_command: DEFAULT_REMOTE_COMMAND.to_string(),
            credential,
            prompt: DEFAULT_PROMPT.to_string(),
            prompt_regex: None,
            rejection_markers: DEFAULT_REJECTION_MARKERS.map(String::from).to_vec(),
            prompt_timeout: Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS),
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
            strip_ansi: false,
            max_buffer_size: None,
        }
    }

    /// Set the client program (default: `ssh`).
    pub fn ssh_program(mut self, program: impl Into<String>) -> Self {
        self.ssh_program = program.into();
        self
    }

    /// Set the host key checking policy (default: [`HostKeyPolicy::No`]).
    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Set the `user@host` target.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Set the command run on the remote host.
    ///
    /// Passed to the client as a single argument; the remote shell interprets
    /// pipes and quoting.
    pub fn remote_command(mut self, command: impl Into<String>) -> Self {
        self.remote_command = command.into();
        self
    }

    /// Set the prompt text, matched ignoring ASCII case.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Recognise the prompt with a regular expression instead of plain text.
    pub fn prompt_regex(mut self, regex: impl Into<String>) -> Self {
        self.prompt_regex = Some(regex.into());
        self
    }

    /// Replace the texts (matched ignoring ASCII case) that mark a refused
    /// credential in the relayed output.
    ///
    /// A marker counts only on the client's own lines before remote output
    /// starts: at the start of a line, or after a `user@host: ` prefix. A
    /// repeated prompt left unanswered always counts as well.
    pub fn rejection_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejection_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Set how long to wait for the prompt (default: 20 seconds).
    pub fn prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// Set the pause between credential and output relay (default: 2 seconds).
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Strip ANSI escape sequences before looking for the prompt.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    /// Bound the bytes kept while waiting for the prompt (default: unbounded,
    /// everything captured is returned).
    ///
    /// Past the bound only the newest two thirds are kept. The prompt is looked
    /// for before anything is dropped. [`validate`](Self::validate) rejects a
    /// bound below 4096 bytes, the size of a single read.
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = Some(size);
        self
    }

    /// The `user@host` target.
    pub fn target_str(&self) -> &str {
        &self.target
    }

    /// The client program.
    pub fn program(&self) -> &str {
        &self.ssh_program
    }

    /// The credential sent after the prompt.
    pub fn credential(&self) -> &Secret {
        &self.credential
    }

    /// Argument vector for the client: host key option, target, command.
    pub fn client_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            format!("StrictHostKeyChecking={}", self.host_key_policy.as_str()),
            self.target.clone(),
            self.remote_command.clone(),
        ]
    }

    /// The pattern that identifies the password prompt.
    ///
    /// # Errors
    ///
    /// Returns a pattern error if the configured regex is invalid.
    pub fn prompt_pattern(&self) -> Result<Pattern, ProbeError> {
        match &self.prompt_regex {
            Some(regex) => Pattern::regex(regex)
                .map_err(|e| ProbeError::PatternError(e.into())),
            None => Ok(Pattern::exact_ignore_case(self.prompt.as_str())),
        }
    }

    /// Patterns for the client's refusal lines, one per non-empty marker.
    pub fn rejection_patterns(&self) -> Vec<Pattern> {
        self.rejection_markers
            .iter()
            .filter(|m| !m.is_empty())
            .map(|m| Pattern::exact_ignore_case(m.as_str()))
            .collect()
    }

    /// Check that every required parameter is present.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Config`] naming the first missing parameter or a
    /// capture bound below 4096 bytes, or a pattern error for an invalid
    /// prompt regex.
    pub fn validate(&self) -> Result<(), ProbeError> {
        let required = [
            ("client program", self.ssh_program.trim().is_empty()),
            ("target", self.target.trim().is_empty()),
            ("remote command", self.remote_command.trim().is_empty()),
            ("credential", self.credential.is_empty()),
            (
                "prompt",
                self.prompt_regex.is_none() && self.prompt.is_empty(),
            ),
        ];

        if let Some((name, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(ProbeError::Config(format!("{name} must not be empty")));
        }

        if let Some(size) = self.max_buffer_size.filter(|&size| size < READ_CHUNK_SIZE) {
            return Err(ProbeError::Config(format!(
                "capture buffer size {size} is below the minimum of {READ_CHUNK_SIZE} bytes"
            )));
        }

        self.prompt_pattern().map(|_| ())
    }
}
