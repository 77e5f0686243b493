//! Tag convention detection
//!
//! A repository's tag namespace stays homogeneous: annotated and lightweight tags
//! cannot be ordered against each other, so mixing them would break ranking. The
//! first tag by name decides which convention is in force; caller preference only
//! matters for a repository with no tags yet.

use crate::repository::WorkingCopy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;
use vcs::{Gateway, GatewayResult, GitCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagConvention {
    /// Separate tag objects carrying tagger, date and message
    Annotated,
    /// Bare names pointing straight at a commit
    #[default]
    Lightweight,
}

impl fmt::Display for TagConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagConvention::Annotated => write!(f, "annotated"),
            TagConvention::Lightweight => write!(f, "lightweight"),
        }
    }
}

/// Outcome of reconciling a requested convention against the detected one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub requested: TagConvention,
    /// `None` when the repository has no tags
    pub detected: Option<TagConvention>,
    pub effective: TagConvention,
    /// True when the request was overridden by the detected convention
    pub overridden: bool,
}

/// `refname<TAB>taggerdate`; the date is empty for lightweight tags
const CONVENTION_FORMAT: &str = "%(refname:strip=2)%09%(taggerdate)";

/// Inspect the first tag by name and report its convention
pub async fn detect(
    gateway: &dyn Gateway,
    working_copy: &WorkingCopy,
) -> GatewayResult<Option<TagConvention>> {
    let command = GitCommand::ForEachTag {
        sort: vec!["refname".to_string()],
        format: CONVENTION_FORMAT.to_string(),
        count: Some(1),
    };
    let output = gateway.run_checked(working_copy.path(), &command).await?;

    let first = output.stdout_lines().next().map(convention_of_line);
    Ok(first)
}

fn convention_of_line(line: &str) -> TagConvention {
    let has_tagger_date = line
        .split_once('\t')
        .is_some_and(|(_, date)| !date.trim().is_empty());
    if has_tagger_date {
        TagConvention::Annotated
    } else {
        TagConvention::Lightweight
    }
}

/// The detected convention wins; the request only applies to a tagless repository
pub fn reconcile(requested: TagConvention, detected: Option<TagConvention>) -> Reconciliation {
    let effective = detected.unwrap_or(requested);
    Reconciliation {
        requested,
        detected,
        effective,
        overridden: effective != requested,
    }
}

/// [`detect`] then [`reconcile`], with a notice when the request is overridden
pub async fn resolve_convention(
    gateway: &dyn Gateway,
    working_copy: &WorkingCopy,
    requested: TagConvention,
) -> GatewayResult<Reconciliation> {
    let detected = detect(gateway, working_copy).await?;
    let reconciliation = reconcile(requested, detected);

    if reconciliation.overridden {
        info!(
            "{} uses {} tags; creating {} tags instead of the requested {}",
            working_copy.repository,
            reconciliation.effective,
            reconciliation.effective,
            requested
        );
    }

    Ok(reconciliation)
}
