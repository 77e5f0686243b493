use crate::command::GitCommand;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Errors raised while talking to the git binary
///
/// A non-zero exit is not an error at the gateway level: it is reported through
/// [`CommandOutput::status`] and only becomes [`GatewayError::Failed`] when the
/// caller asks for it via [`CommandOutput::into_result`].
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The git process could not be started at all
    #[error("Failed to start `{command}` in {}: {source}", .dir.display())]
    Spawn {
        command: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The git process did not finish within the configured timeout
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// The git process exited unsuccessfully
    #[error("`{command}` exited with {}: {}", describe_status(.status), .stderr.trim())]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// IO error while collecting the process output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no exit status (killed by signal)".to_string(),
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Captured result of one git invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with nothing on either stream (what dry-run returns)
    pub fn empty() -> Self {
        Self {
            status: Some(0),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Non-blank stdout lines, trimmed
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }

    /// Diagnostic text if any was written, stdout otherwise
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }

    /// Turn a non-zero exit into [`GatewayError::Failed`]
    pub fn into_result(self, command: &GitCommand) -> GatewayResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(GatewayError::Failed {
                command: command.to_string(),
                status: self.status,
                stderr: self.diagnostic().to_string(),
            })
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Run `command` with `dir` as the working directory
    async fn run(&self, dir: &Path, command: &GitCommand) -> GatewayResult<CommandOutput>;

    /// True when commands are only logged, never executed
    fn is_dry_run(&self) -> bool;

    /// Run `command` and fail on a non-zero exit
    async fn run_checked(&self, dir: &Path, command: &GitCommand) -> GatewayResult<CommandOutput> {
        self.run(dir, command).await?.into_result(command)
    }
}

/// Configuration for [`GitGateway`]
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// git executable to invoke
    pub program: PathBuf,
    /// Upper bound on a single git invocation
    pub timeout: Duration,
    /// Log commands instead of running them
    pub dry_run: bool,
    /// Surface git's diagnostic output at info level
    pub verbose: bool,
    /// Extra environment variables for every invocation
    pub env_vars: Vec<(String, String)>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            timeout: Duration::from_secs(120),
            dry_run: false,
            verbose: false,
            // Never block on a credential prompt; the transport is assumed to be authenticated.
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.program.as_os_str().is_empty() {
            return Err("git program cannot be empty".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Command timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Gateway backed by the `git` command-line tool
#[derive(Debug, Clone)]
pub struct GitGateway {
    config: GatewayConfig,
}

impl GitGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

impl Default for GitGateway {
    fn default() -> Self {
        Self::new(GatewayConfig::default())
    }
}

#[async_trait]
impl Gateway for GitGateway {
    async fn run(&self, dir: &Path, command: &GitCommand) -> GatewayResult<CommandOutput> {
        let rendered = command.to_string();

        if self.config.dry_run {
            if command.is_mutating() {
                info!("cd {}; {}", dir.display(), rendered);
            } else {
                debug!("cd {}; {}", dir.display(), rendered);
            }
            return Ok(CommandOutput::empty());
        }

        debug!(dir = %dir.display(), command = %rendered, "running git");

        let child = Command::new(&self.config.program)
            .args(command.args())
            .current_dir(dir)
            .envs(self.config.env_vars.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GatewayError::Spawn {
                command: rendered.clone(),
                dir: dir.to_path_buf(),
                source,
            })?;

        // On timeout the child is dropped, and kill_on_drop reaps it.
        let output = match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(GatewayError::Timeout {
                    command: rendered,
                    timeout: self.config.timeout,
                })
            }
        };

        let output = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            if self.config.verbose {
                info!("{}", stderr);
            } else {
                debug!(command = %rendered, "{}", stderr);
            }
        }

        Ok(output)
    }

    fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }
}

/// Check whether a usable git binary is on PATH
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}
