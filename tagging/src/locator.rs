//! Repository locator
//!
//! Maps a [`RepositoryRef`] to a local clone under a fixed root. The path is a
//! pure function of the reference, so resolving twice (in one run or across runs)
//! yields the same directory and clones at most once. Existing clones are reused
//! as-is: nothing is pulled here, the transition engine syncs explicitly.

use crate::repository::{RepositoryRef, WorkingCopy};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};
use vcs::{Gateway, GatewayError, GitCommand};

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Failed to clone {repository}: {source}")]
    CloneFailed {
        repository: String,
        #[source]
        source: GatewayError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LocatorResult<T> = Result<T, LocatorError>;

pub struct Locator {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl Locator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the clone of `repository` lives, whether or not it exists yet
    pub fn path_for(&self, repository: &RepositoryRef) -> PathBuf {
        self.root.join(repository.local_dir_name())
    }

    /// Return the working copy for `repository`, cloning it on first use
    pub async fn resolve(
        &self,
        gateway: &dyn Gateway,
        repository: &RepositoryRef,
    ) -> LocatorResult<WorkingCopy> {
        let path = self.path_for(repository);
        let working_copy = WorkingCopy::new(repository.clone(), path.clone());

        if tokio::fs::try_exists(path.join(".git")).await? {
            debug!(repository = %repository, path = %path.display(), "reusing working copy");
            return Ok(working_copy);
        }

        let clone = GitCommand::Clone {
            url: repository.remote_url.clone(),
            dir: path.clone(),
        };

        if gateway.is_dry_run() {
            // Nothing is created on disk; the gateway only logs the clone.
            gateway
                .run(&self.root, &clone)
                .await
                .map_err(|source| LocatorError::CloneFailed {
                    repository: repository.short_name(),
                    source,
                })?;
            return Ok(working_copy);
        }

        info!(repository = %repository, path = %path.display(), "cloning");
        tokio::fs::create_dir_all(&self.root).await?;
        gateway
            .run_checked(&self.root, &clone)
            .await
            .map_err(|source| LocatorError::CloneFailed {
                repository: repository.short_name(),
                source,
            })?;

        Ok(working_copy)
    }

    /// Exclusive access to one working copy
    ///
    /// Two operations on the same clone (the same repository listed twice, or
    /// concurrent batch jobs) are serialized through this guard.
    pub async fn lock(&self, working_copy: &WorkingCopy) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry(working_copy.path.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
