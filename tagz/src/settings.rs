//! Settings file
//!
//! Values are layered: built-in defaults, then the TOML file (`--config` or
//! `TAGZ_CONFIG`), then command-line flags.
//!
//! ```toml
//! git_root = "/var/tmp/tagz"
//! host = "github.com"
//! web_base = "https://github.com"
//! primary_branch = "master"
//! jobs = 4
//! repos = ["mozilla/fireplace", "mozilla/zamboni"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tagging::{EngineConfig, RecoveryPolicy, DEFAULT_HOST};
use thiserror::Error;
use vcs::GatewayConfig;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding one clone per repository
    pub git_root: PathBuf,
    /// Host used to expand `team/name` shorthand
    pub host: String,
    /// Base of comparison and release links
    pub web_base: String,
    pub primary_branch: String,
    pub remote: String,
    pub pull_rebase: bool,
    pub command_timeout_secs: u64,
    pub clipboard: bool,
    /// Repositories processed at once
    pub jobs: usize,
    pub recovery: RecoveryPolicy,
    /// Used when no repository is given on the command line
    pub repos: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            git_root: std::env::temp_dir().join("tagz"),
            host: DEFAULT_HOST.to_string(),
            web_base: "https://github.com".to_string(),
            primary_branch: "master".to_string(),
            remote: "origin".to_string(),
            pull_rebase: true,
            command_timeout_secs: 120,
            clipboard: true,
            jobs: 1,
            recovery: RecoveryPolicy::Manual,
            repos: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_toml(path: &Path, contents: &str) -> SettingsResult<Self> {
        toml::from_str(contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> SettingsResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &contents)
    }

    /// Defaults overlaid with `path`, when one is given
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> SettingsResult<()> {
        if self.host.trim().is_empty() {
            return Err(SettingsError::Invalid("host cannot be empty".to_string()));
        }
        if !(self.web_base.starts_with("https://") || self.web_base.starts_with("http://")) {
            return Err(SettingsError::Invalid(format!(
                "web_base must be an http(s) URL, got '{}'",
                self.web_base
            )));
        }
        if self.jobs == 0 {
            return Err(SettingsError::Invalid(
                "jobs must be at least 1".to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "command_timeout_secs must be greater than 0".to_string(),
            ));
        }
        self.engine_config()
            .validate()
            .map_err(SettingsError::Invalid)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_primary_branch(self.primary_branch.clone())
            .with_remote(self.remote.clone())
            .with_pull_rebase(self.pull_rebase)
            .with_recovery(self.recovery)
    }

    pub fn gateway_config(&self, dry_run: bool, verbose: bool) -> GatewayConfig {
        GatewayConfig::new()
            .with_timeout(Duration::from_secs(self.command_timeout_secs))
            .with_dry_run(dry_run)
            .with_verbose(verbose)
    }
}

/// One repository per line; blank lines and `#` comments are skipped
pub fn parse_repos_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_repos_file(path: &Path) -> SettingsResult<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_repos_list(&contents))
}
