//! Recent-tag ranking
//!
//! Finds the two most recent tags so a comparison link can be built. Results are
//! only meaningful when the repository uses one convention throughout, tag names
//! sort lexicographically in chronological order (date-stamped names), and tags
//! were applied in sequence without retroactively tagging older history.

use crate::convention::TagConvention;
use crate::repository::WorkingCopy;
use serde::{Deserialize, Serialize};
use vcs::{Gateway, GatewayResult, GitCommand};

/// The newest tag and the one it should be compared against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPair {
    pub latest: String,
    pub previous: String,
}

impl TagPair {
    /// Build a pair from tags ordered newest first
    ///
    /// A lone tag is compared against `primary_branch`; no tags at all gives `None`.
    pub fn from_ranked(ranked: &[String], primary_branch: &str) -> Option<Self> {
        let latest = ranked.first()?.clone();
        let previous = ranked
            .get(1)
            .cloned()
            .unwrap_or_else(|| primary_branch.to_string());
        Some(Self { latest, previous })
    }
}

/// for-each-ref sort keys, least significant first (git applies the last key first)
pub fn ordering_keys(convention: TagConvention) -> Vec<String> {
    match convention {
        // Tag objects carry their own date; name breaks ties within one second.
        TagConvention::Annotated => vec!["-refname".to_string(), "-taggerdate".to_string()],
        // Commit dates say nothing about when a lightweight tag was applied.
        TagConvention::Lightweight => vec!["-refname".to_string()],
    }
}

/// Up to `count` tag names, newest first
pub async fn recent_tags(
    gateway: &dyn Gateway,
    working_copy: &WorkingCopy,
    convention: TagConvention,
    count: usize,
) -> GatewayResult<Vec<String>> {
    let command = GitCommand::ForEachTag {
        sort: ordering_keys(convention),
        format: "%(refname:strip=2)".to_string(),
        count: Some(count),
    };
    let output = gateway.run_checked(working_copy.path(), &command).await?;

    Ok(output.stdout_lines().map(str::to_string).collect())
}

/// The latest tag and its predecessor (or `primary_branch` when there is only one)
pub async fn rank_recent(
    gateway: &dyn Gateway,
    working_copy: &WorkingCopy,
    convention: TagConvention,
    primary_branch: &str,
) -> GatewayResult<Option<TagPair>> {
    let ranked = recent_tags(gateway, working_copy, convention, 2).await?;
    Ok(TagPair::from_ranked(&ranked, primary_branch))
}
