//! Tag transition engine
//!
//! Drives one repository through `Clean → Synced → Mutated → Published` for a
//! single [`TagOperation`]:
//!
//! | command    | after sync                                                          |
//! |------------|---------------------------------------------------------------------|
//! | create     | tag HEAD, push tags                                                 |
//! | delete     | delete local tag, delete remote tag                                 |
//! | cherrypick | checkout tag, delete it locally and remotely, cherry-pick, re-tag, push |
//! | revert     | same as cherrypick, with `revert` instead of `cherry-pick`          |
//!
//! Every git step must exit successfully; the first failure halts the sequence.
//! Cherrypick and revert are not atomic, so they record [`Checkpoint`]s as they go.
//! With [`RecoveryPolicy::Manual`] a failure leaves the repository where it
//! stopped and the error lists the checkpoints reached. With
//! [`RecoveryPolicy::Rollback`] the in-progress change is aborted and the tag is
//! restored at the commit it pointed to before the operation.

use crate::config::{EngineConfig, RecoveryPolicy};
use crate::convention::TagConvention;
use crate::repository::WorkingCopy;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use vcs::{CommandOutput, Gateway, GatewayError, GitCommand};

/// Tag mutation requested by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum TagCommand {
    Create,
    Delete,
    CherryPick { sha: String },
    Revert { sha: String },
}

impl TagCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TagCommand::Create => "create",
            TagCommand::Delete => "delete",
            TagCommand::CherryPick { .. } => "cherrypick",
            TagCommand::Revert { .. } => "revert",
        }
    }

    fn sha(&self) -> Option<&str> {
        match self {
            TagCommand::CherryPick { sha } | TagCommand::Revert { sha } => Some(sha),
            TagCommand::Create | TagCommand::Delete => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("A commit sha is required for {command}")]
    MissingSha { command: &'static str },

    #[error("Tag name cannot be empty")]
    EmptyTag,

    #[error("Invalid tag name '{name}': {reason}")]
    InvalidTag { name: String, reason: &'static str },

    #[error("Invalid commit sha '{0}'")]
    InvalidSha(String),
}

/// One tag mutation: what to do, to which tag name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOperation {
    pub command: TagCommand,
    pub tag: String,
    /// Message for annotated tags; defaults to the tag name
    pub message: Option<String>,
}

impl TagOperation {
    pub fn new(command: TagCommand, tag: impl Into<String>) -> Self {
        Self {
            command,
            tag: tag.into(),
            message: None,
        }
    }

    pub fn create(tag: impl Into<String>) -> Self {
        Self::new(TagCommand::Create, tag)
    }

    pub fn delete(tag: impl Into<String>) -> Self {
        Self::new(TagCommand::Delete, tag)
    }

    pub fn cherry_pick(tag: impl Into<String>, sha: impl Into<String>) -> Self {
        Self::new(TagCommand::CherryPick { sha: sha.into() }, tag)
    }

    pub fn revert(tag: impl Into<String>, sha: impl Into<String>) -> Self {
        Self::new(TagCommand::Revert { sha: sha.into() }, tag)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Reject operations that must never reach git
    pub fn validate(&self) -> Result<(), OperationError> {
        validate_tag_name(&self.tag)?;

        match &self.command {
            TagCommand::CherryPick { sha } | TagCommand::Revert { sha } => {
                if sha.trim().is_empty() {
                    return Err(OperationError::MissingSha {
                        command: self.command.name(),
                    });
                }
                if sha.starts_with('-') || sha.chars().any(char::is_whitespace) {
                    return Err(OperationError::InvalidSha(sha.to_string()));
                }
                Ok(())
            }
            TagCommand::Create | TagCommand::Delete => Ok(()),
        }
    }

    fn annotation(&self) -> String {
        self.message.clone().unwrap_or_else(|| self.tag.clone())
    }
}

fn validate_tag_name(name: &str) -> Result<(), OperationError> {
    let invalid = |reason| {
        Err(OperationError::InvalidTag {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return Err(OperationError::EmptyTag);
    }
    if name.starts_with('-') {
        return invalid("cannot start with '-'");
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
    {
        return invalid("contains a character git does not allow in ref names");
    }
    if name.contains("..") || name.contains("@{") || name.contains("//") {
        return invalid("contains a sequence git does not allow in ref names");
    }
    if name.starts_with('/') || name.ends_with('/') || name.ends_with('.') {
        return invalid("cannot start or end with '/' or end with '.'");
    }
    if name.ends_with(".lock") || name == "@" {
        return invalid("is reserved by git");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionState {
    /// No tag operation pending
    Clean,
    /// Primary branch checked out and tags fetched
    Synced,
    /// Local tag namespace changed
    Mutated,
    /// Remote tag namespace changed
    Published,
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionState::Clean => "clean",
            TransitionState::Synced => "synced",
            TransitionState::Mutated => "mutated",
            TransitionState::Published => "published",
        };
        write!(f, "{}", name)
    }
}

/// Progress markers recorded while mutating a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "checkpoint", rename_all = "snake_case")]
pub enum Checkpoint {
    /// Existing tag checked out; `commit` is where it pointed
    CheckedOut { commit: String },
    LocalTagDeleted,
    RemoteTagDeleted,
    /// Cherry-pick or revert committed on top of the old tag
    ChangeApplied,
    TagCreated,
    Published,
    /// Tag restored at its original commit after a failure
    RolledBack,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(#[from] OperationError),

    #[error("Cannot {action} in state {state}")]
    InvalidState {
        action: &'static str,
        state: TransitionState,
    },

    #[error("`{step}` failed{}: {source}", recovery_note(.reached, .rolled_back))]
    StepFailed {
        step: String,
        reached: Vec<Checkpoint>,
        rolled_back: bool,
        #[source]
        source: GatewayError,
    },

    #[error("`{step}` failed and rollback also failed ({rollback}); manual recovery needed after {reached:?}: {source}")]
    RollbackFailed {
        step: String,
        reached: Vec<Checkpoint>,
        rollback: GatewayError,
        #[source]
        source: GatewayError,
    },
}

fn recovery_note(reached: &[Checkpoint], rolled_back: &bool) -> String {
    if *rolled_back {
        " (tag restored at its original commit)".to_string()
    } else if reached.contains(&Checkpoint::LocalTagDeleted)
        && !reached.contains(&Checkpoint::Published)
    {
        format!(" (manual recovery needed, reached {:?})", reached)
    } else {
        String::new()
    }
}

impl EngineError {
    /// Checkpoints reached before the failure, if the failure happened mid-sequence
    pub fn checkpoints(&self) -> &[Checkpoint] {
        match self {
            EngineError::StepFailed { reached, .. } | EngineError::RollbackFailed { reached, .. } => {
                reached
            }
            EngineError::InvalidOperation(_) | EngineError::InvalidState { .. } => &[],
        }
    }

    /// True when the repository was left with the tag removed but not restored
    pub fn needs_manual_recovery(&self) -> bool {
        match self {
            EngineError::RollbackFailed { .. } => true,
            EngineError::StepFailed {
                reached,
                rolled_back,
                ..
            } => {
                !rolled_back
                    && reached.contains(&Checkpoint::LocalTagDeleted)
                    && !reached.contains(&Checkpoint::Published)
            }
            EngineError::InvalidOperation(_) | EngineError::InvalidState { .. } => false,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// What a completed transition did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReport {
    pub repository: String,
    pub operation: TagOperation,
    pub convention: TagConvention,
    pub state: TransitionState,
    pub checkpoints: Vec<Checkpoint>,
    /// Commit the tag pointed to before the operation (delete/cherrypick/revert)
    pub target_before: Option<String>,
    /// Commit the tag points to afterwards (create/cherrypick/revert)
    pub target_after: Option<String>,
}

/// State machine for one operation on one working copy
pub struct TagTransition<'a> {
    gateway: &'a dyn Gateway,
    working_copy: &'a WorkingCopy,
    config: &'a EngineConfig,
    state: TransitionState,
    checkpoints: Vec<Checkpoint>,
}

impl<'a> TagTransition<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        working_copy: &'a WorkingCopy,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            gateway,
            working_copy,
            config,
            state: TransitionState::Clean,
            checkpoints: Vec::new(),
        }
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Check out the primary branch and bring tags and code up to date
    pub async fn sync(&mut self) -> EngineResult<()> {
        self.expect_state(TransitionState::Clean, "sync")?;

        self.step(GitCommand::checkout(&self.config.primary_branch))
            .await?;
        self.step(GitCommand::fetch_tags(&self.config.remote)).await?;
        self.step(GitCommand::Pull {
            rebase: self.config.pull_rebase,
        })
        .await?;

        self.state = TransitionState::Synced;
        debug!(repository = %self.working_copy.repository, "synced");
        Ok(())
    }

    /// Apply `operation` using `convention` for any tag (re)created
    pub async fn apply(
        &mut self,
        operation: &TagOperation,
        convention: TagConvention,
    ) -> EngineResult<TransitionReport> {
        operation.validate()?;
        self.expect_state(TransitionState::Synced, operation.command.name())?;

        info!(
            repository = %self.working_copy.repository,
            tag = %operation.tag,
            %convention,
            "{}",
            operation.command.name()
        );

        let (target_before, target_after) = match &operation.command {
            TagCommand::Create => {
                self.create_tag(operation, convention).await?;
                self.publish_tags().await?;
                (None, self.target_of(&operation.tag).await?)
            }
            TagCommand::Delete => {
                let before = self.target_of(&operation.tag).await?;
                self.delete_tag(&operation.tag).await?;
                self.state = TransitionState::Published;
                (before, None)
            }
            TagCommand::CherryPick { .. } | TagCommand::Revert { .. } => {
                let before = self.rewrite_tag(operation, convention).await?;
                (before, self.target_of(&operation.tag).await?)
            }
        };

        Ok(TransitionReport {
            repository: self.working_copy.repository.short_name(),
            operation: operation.clone(),
            convention,
            state: self.state,
            checkpoints: self.checkpoints.clone(),
            target_before,
            target_after,
        })
    }

    async fn create_tag(
        &mut self,
        operation: &TagOperation,
        convention: TagConvention,
    ) -> EngineResult<()> {
        // A name collision makes git exit non-zero, which stops here.
        self.step(tag_command(operation, convention)).await?;
        self.record(Checkpoint::TagCreated);
        self.state = TransitionState::Mutated;
        Ok(())
    }

    async fn publish_tags(&mut self) -> EngineResult<()> {
        self.step(GitCommand::PushTags).await?;
        self.record(Checkpoint::Published);
        self.state = TransitionState::Published;
        Ok(())
    }

    async fn delete_tag(&mut self, tag: &str) -> EngineResult<()> {
        self.step(GitCommand::delete_tag(tag)).await?;
        self.record(Checkpoint::LocalTagDeleted);
        self.state = TransitionState::Mutated;

        self.step(GitCommand::delete_remote_tag(&self.config.remote, tag))
            .await?;
        self.record(Checkpoint::RemoteTagDeleted);
        Ok(())
    }

    /// Cherrypick/revert saga; returns the commit the tag pointed to before
    async fn rewrite_tag(
        &mut self,
        operation: &TagOperation,
        convention: TagConvention,
    ) -> EngineResult<Option<String>> {
        let tag = operation.tag.as_str();
        let sha = operation.command.sha().unwrap_or_default();

        let original = self.target_of(tag).await?;
        let annotated = self.keep_annotation(operation, convention).await?;
        let operation = &annotated;
        self.step(GitCommand::checkout(tag)).await?;
        self.record(Checkpoint::CheckedOut {
            commit: original.clone().unwrap_or_default(),
        });

        let change = match operation.command {
            TagCommand::Revert { .. } => GitCommand::Revert {
                sha: sha.to_string(),
            },
            _ => GitCommand::CherryPick {
                sha: sha.to_string(),
            },
        };

        let result = self.rewrite_steps(operation, convention, change).await;
        match result {
            Ok(()) => Ok(original),
            Err(err) => Err(self.recover(operation, convention, original, err).await),
        }
    }

    /// Carry the existing annotation over to the re-created tag unless a new message was given
    async fn keep_annotation(
        &self,
        operation: &TagOperation,
        convention: TagConvention,
    ) -> EngineResult<TagOperation> {
        if convention != TagConvention::Annotated || operation.message.is_some() {
            return Ok(operation.clone());
        }
        let output = self.step(GitCommand::tag_message(&operation.tag)).await?;
        let message = output.stdout.trim_end();
        if message.is_empty() {
            return Ok(operation.clone());
        }
        Ok(operation.clone().with_message(message))
    }

    async fn rewrite_steps(
        &mut self,
        operation: &TagOperation,
        convention: TagConvention,
        change: GitCommand,
    ) -> EngineResult<()> {
        self.delete_tag(&operation.tag).await?;
        self.step(change).await?;
        self.record(Checkpoint::ChangeApplied);
        self.create_tag(operation, convention).await?;
        self.publish_tags().await
    }

    async fn recover(
        &mut self,
        operation: &TagOperation,
        convention: TagConvention,
        original: Option<String>,
        err: EngineError,
    ) -> EngineError {
        let (step, source) = match err {
            EngineError::StepFailed { step, source, .. } => (step, source),
            other => return other,
        };
        let reached = self.checkpoints.clone();

        let rollback_possible = original.is_some() && reached.contains(&Checkpoint::LocalTagDeleted);
        if self.config.recovery == RecoveryPolicy::Manual || !rollback_possible {
            if reached.contains(&Checkpoint::LocalTagDeleted) {
                warn!(
                    repository = %self.working_copy.repository,
                    tag = %operation.tag,
                    "`{}` failed after {:?}; the tag must be restored by hand",
                    step,
                    reached
                );
            }
            return EngineError::StepFailed {
                step,
                reached,
                rolled_back: false,
                source,
            };
        }

        let original = original.unwrap_or_default();
        warn!(
            repository = %self.working_copy.repository,
            tag = %operation.tag,
            "`{}` failed; restoring tag at {}",
            step,
            original
        );

        match self
            .rollback(operation, convention, &original, &reached)
            .await
        {
            Ok(()) => {
                self.record(Checkpoint::RolledBack);
                self.state = TransitionState::Synced;
                EngineError::StepFailed {
                    step,
                    reached,
                    rolled_back: true,
                    source,
                }
            }
            Err(rollback) => EngineError::RollbackFailed {
                step,
                reached,
                rollback,
                source,
            },
        }
    }

    async fn rollback(
        &self,
        operation: &TagOperation,
        convention: TagConvention,
        original: &str,
        reached: &[Checkpoint],
    ) -> Result<(), GatewayError> {
        let dir = self.working_copy.path();

        if !reached.contains(&Checkpoint::ChangeApplied) {
            let abort = match operation.command {
                TagCommand::Revert { .. } => GitCommand::RevertAbort,
                _ => GitCommand::CherryPickAbort,
            };
            // Nothing to abort when the change failed before starting.
            let output = self.gateway.run(dir, &abort).await?;
            if !output.success() {
                debug!("{} had nothing to abort: {}", abort, output.diagnostic().trim());
            }
        }

        if reached.contains(&Checkpoint::TagCreated) {
            self.gateway
                .run_checked(dir, &GitCommand::delete_tag(&operation.tag))
                .await?;
        }

        self.gateway
            .run_checked(dir, &tag_command(operation, convention).at(original))
            .await?;

        if reached.contains(&Checkpoint::RemoteTagDeleted) {
            self.gateway.run_checked(dir, &GitCommand::PushTags).await?;
        }

        Ok(())
    }

    /// Commit a tag points to; `None` when it cannot be read (or in dry-run)
    async fn target_of(&self, tag: &str) -> EngineResult<Option<String>> {
        let output = self
            .gateway
            .run(self.working_copy.path(), &GitCommand::rev_parse(tag))
            .await
            .map_err(|source| self.failed(GitCommand::rev_parse(tag), source))?;

        if !output.success() {
            return Ok(None);
        }
        let target = output.stdout_lines().next().map(str::to_string);
        Ok(target)
    }

    async fn step(&self, command: GitCommand) -> EngineResult<CommandOutput> {
        let result = self
            .gateway
            .run_checked(self.working_copy.path(), &command)
            .await;
        result.map_err(|source| self.failed(command, source))
    }

    fn failed(&self, command: GitCommand, source: GatewayError) -> EngineError {
        EngineError::StepFailed {
            step: command.to_string(),
            reached: self.checkpoints.clone(),
            rolled_back: false,
            source,
        }
    }

    fn record(&mut self, checkpoint: Checkpoint) {
        debug!(repository = %self.working_copy.repository, ?checkpoint, "checkpoint");
        self.checkpoints.push(checkpoint);
    }

    fn expect_state(&self, expected: TransitionState, action: &'static str) -> EngineResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                action,
                state: self.state,
            })
        }
    }
}

fn tag_command(operation: &TagOperation, convention: TagConvention) -> GitCommand {
    match convention {
        TagConvention::Annotated => GitCommand::annotated_tag(&operation.tag, operation.annotation()),
        TagConvention::Lightweight => GitCommand::lightweight_tag(&operation.tag),
    }
}
