use serde::{Deserialize, Serialize};

/// What to do when a cherrypick/revert fails after the tag was already removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Stop and report the checkpoints reached; the operator repairs by hand
    #[default]
    Manual,
    /// Abort the in-progress change and restore the tag at its original commit
    Rollback,
}

/// Per-run settings for the tag transition engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Branch synced before every operation, and the fallback "previous" tag
    pub primary_branch: String,
    /// Remote that receives tag deletions
    pub remote: String,
    /// Use `pull --rebase` instead of a plain `pull`
    pub pull_rebase: bool,
    pub recovery: RecoveryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_branch: "master".to_string(),
            remote: "origin".to_string(),
            pull_rebase: true,
            recovery: RecoveryPolicy::Manual,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary_branch(mut self, branch: impl Into<String>) -> Self {
        self.primary_branch = branch.into();
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn with_pull_rebase(mut self, pull_rebase: bool) -> Self {
        self.pull_rebase = pull_rebase;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.primary_branch.trim().is_empty() {
            return Err("Primary branch cannot be empty".to_string());
        }

        if self.primary_branch.starts_with('-') {
            return Err("Primary branch cannot start with '-'".to_string());
        }

        if self.remote.trim().is_empty() {
            return Err("Remote name cannot be empty".to_string());
        }

        if self.remote.starts_with('-') {
            return Err("Remote name cannot start with '-'".to_string());
        }

        Ok(())
    }
}
