//! Batch driver
//!
//! For each repository: lock its working copy, resolve (clone on first use),
//! sync, reconcile the tag convention, apply the operation, rank the two most
//! recent tags and build the comparison link. Results come back in input order.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tagging::{
    rank_recent, resolve_convention, ComparisonLink, EngineConfig, Locator, OperationError,
    Reconciliation, RepositoryRef, TagConvention, TagOperation, TagPair, TagTransition,
    TaggingError, TaggingResult, TransitionReport, WorkingCopy,
};
use thiserror::Error;
use tracing::{error, info, warn};
use vcs::Gateway;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    InvalidOperation(#[from] OperationError),

    #[error("Invalid driver configuration: {0}")]
    InvalidConfig(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// What happens to the rest of a batch after one repository fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    ContinueOnError,
    /// Repositories not yet started are skipped
    FailFast,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Convention for repositories without tags
    pub requested_convention: TagConvention,
    pub web_base: String,
    pub jobs: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            requested_convention: TagConvention::default(),
            web_base: "https://github.com".to_string(),
            jobs: 1,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_requested_convention(mut self, convention: TagConvention) -> Self {
        self.requested_convention = convention;
        self
    }

    pub fn with_web_base(mut self, web_base: impl Into<String>) -> Self {
        self.web_base = web_base.into();
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jobs == 0 {
            return Err("jobs must be at least 1".to_string());
        }
        if self.web_base.trim().is_empty() {
            return Err("web_base cannot be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    /// Not attempted because an earlier repository failed under fail-fast
    Skipped,
}

/// Result for one repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoOutcome {
    pub repository: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convention: Option<Reconciliation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The tag was removed and not restored; see `error` for what was reached
    #[serde(default)]
    pub needs_manual_recovery: bool,
}

impl RepoOutcome {
    fn new(repository: &RepositoryRef, status: OutcomeStatus) -> Self {
        Self {
            repository: repository.short_name(),
            status,
            convention: None,
            transition: None,
            tags: None,
            compare_url: None,
            release_url: None,
            error: None,
            needs_manual_recovery: false,
        }
    }

    fn failed(repository: &RepositoryRef, err: &TaggingError) -> Self {
        let needs_manual_recovery = match err {
            TaggingError::Engine(e) => e.needs_manual_recovery(),
            _ => false,
        };
        Self {
            error: Some(err.to_string()),
            needs_manual_recovery,
            ..Self::new(repository, OutcomeStatus::Failed)
        }
    }
}

/// Aggregated results, in input order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<RepoOutcome>,
}

impl BatchReport {
    /// Comparison links of the repositories that produced one
    pub fn links(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.compare_url.as_deref())
            .collect()
    }

    /// Links joined by newline; empty when there are none (always, in dry-run)
    pub fn output(&self) -> String {
        self.links().join("\n")
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.count(OutcomeStatus::Failed) == 0 && self.count(OutcomeStatus::Skipped) == 0
    }
}

pub struct Driver {
    gateway: Arc<dyn Gateway>,
    locator: Locator,
    engine: EngineConfig,
    config: DriverConfig,
}

impl Driver {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        locator: Locator,
        engine: EngineConfig,
        config: DriverConfig,
    ) -> DriverResult<Self> {
        config.validate().map_err(DriverError::InvalidConfig)?;
        engine.validate().map_err(DriverError::InvalidConfig)?;
        Ok(Self {
            gateway,
            locator,
            engine,
            config,
        })
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Apply `operation` to every repository
    pub async fn run(
        &self,
        repositories: &[RepositoryRef],
        operation: &TagOperation,
    ) -> DriverResult<BatchReport> {
        operation.validate()?;

        let halted = AtomicBool::new(false);
        let halted = &halted;
        let outcomes = stream::iter(repositories)
            .map(|repository| async move {
                if halted.load(Ordering::SeqCst) {
                    info!(repository = %repository, "skipped after an earlier failure");
                    return RepoOutcome::new(repository, OutcomeStatus::Skipped);
                }
                let outcome = self.process(repository, operation).await;
                if outcome.status == OutcomeStatus::Failed
                    && self.config.failure_policy == FailurePolicy::FailFast
                {
                    halted.store(true, Ordering::SeqCst);
                }
                outcome
            })
            .buffered(self.config.jobs)
            .collect::<Vec<_>>()
            .await;

        let report = BatchReport { outcomes };
        info!(
            succeeded = report.count(OutcomeStatus::Succeeded),
            failed = report.count(OutcomeStatus::Failed),
            skipped = report.count(OutcomeStatus::Skipped),
            "batch finished"
        );
        Ok(report)
    }

    async fn process(&self, repository: &RepositoryRef, operation: &TagOperation) -> RepoOutcome {
        match self.process_repository(repository, operation).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(repository = %repository, "{}", e);
                let outcome = RepoOutcome::failed(repository, &e);
                if outcome.needs_manual_recovery {
                    warn!(
                        repository = %repository,
                        tag = %operation.tag,
                        "tag left deleted; recreate it by hand or rerun with --rollback"
                    );
                }
                outcome
            }
        }
    }

    async fn process_repository(
        &self,
        repository: &RepositoryRef,
        operation: &TagOperation,
    ) -> TaggingResult<RepoOutcome> {
        let gateway = self.gateway.as_ref();

        // Lock before resolving so two entries for one repository never clone twice.
        let reserved = WorkingCopy::new(repository.clone(), self.locator.path_for(repository));
        let _guard = self.locator.lock(&reserved).await;
        let working_copy = self.locator.resolve(gateway, repository).await?;

        let mut transition = TagTransition::new(gateway, &working_copy, &self.engine);
        transition.sync().await?;

        let convention =
            resolve_convention(gateway, &working_copy, self.config.requested_convention).await?;
        let report = transition.apply(operation, convention.effective).await?;

        let tags = rank_recent(
            gateway,
            &working_copy,
            convention.effective,
            &self.engine.primary_branch,
        )
        .await?;
        let link = tags
            .as_ref()
            .map(|pair| ComparisonLink::new(repository, pair));

        Ok(RepoOutcome {
            convention: Some(convention),
            transition: Some(report),
            compare_url: link.as_ref().map(|l| l.url(&self.config.web_base)),
            release_url: link.as_ref().map(|l| l.release_url(&self.config.web_base)),
            tags,
            ..RepoOutcome::new(repository, OutcomeStatus::Succeeded)
        })
    }
}
