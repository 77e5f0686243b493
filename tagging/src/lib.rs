//! Tag resolution and tag transitions for date-stamped release tags
//!
//! The pieces, leaves first:
//!
//! - [`repository`]: remote references (`team/name` or a full remote URL) and working copies
//! - [`locator`]: maps a reference to its local clone, cloning on first use
//! - [`convention`]: detects whether a repository uses annotated or lightweight tags
//! - [`engine`]: the create / delete / cherrypick / revert state machine
//! - [`ranker`]: the two most recent tags, for comparison links
//! - [`link`]: comparison and release URLs

pub mod config;
pub mod convention;
pub mod engine;
pub mod link;
pub mod locator;
pub mod ranker;
pub mod repository;

#[cfg(test)]
mod fake;

pub use config::{EngineConfig, RecoveryPolicy};
pub use convention::{detect, reconcile, resolve_convention, Reconciliation, TagConvention};
pub use engine::{
    Checkpoint, EngineError, EngineResult, OperationError, TagCommand, TagOperation,
    TagTransition, TransitionReport, TransitionState,
};
pub use link::ComparisonLink;
pub use locator::{Locator, LocatorError, LocatorResult};
pub use ranker::{rank_recent, recent_tags, TagPair};
pub use repository::{ReferenceError, RepositoryRef, WorkingCopy, DEFAULT_HOST};

use thiserror::Error;

/// Any failure while processing a single repository
#[derive(Error, Debug)]
pub enum TaggingError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Gateway(#[from] vcs::GatewayError),
}

pub type TaggingResult<T> = Result<T, TaggingError>;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::convention::*;
    pub use crate::engine::*;
    pub use crate::link::*;
    pub use crate::locator::*;
    pub use crate::ranker::*;
    pub use crate::repository::*;
    pub use crate::{TaggingError, TaggingResult};
}
