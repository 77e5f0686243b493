//! Checks that run before any repository is touched

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use std::sync::OnceLock;
use tagging::{OperationError, ReferenceError, RepositoryRef, TagOperation};
use thiserror::Error;
use tracing::warn;

/// Left in the tag argument when a command is copied from the docs
pub const PLACEHOLDER_TAG: &str = "YYYY.MM.DD";

const TAG_DATE_FORMAT: &str = "%Y.%m.%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("Replace the YYYY.MM.DD placeholder with the tag to use")]
    PlaceholderTag,

    #[error("{tag} is a Friday. Did you really mean {suggestion}?")]
    FridayTag { tag: String, suggestion: String },

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("Invalid repository '{input}': {source}")]
    Repository {
        input: String,
        #[source]
        source: ReferenceError,
    },

    #[error("No repositories given; use --repo, --repos-file or `repos` in the settings file")]
    NoRepositories,
}

fn date_stamped() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // YYYY.MM.DD with an optional numeric suffix for same-day re-tags
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}\.\d{2}\.\d{2}(\.\d+)?$").unwrap())
}

/// Refuse a tag dated on a Friday, suggesting the following Tuesday
fn check_weekday(tag: &str) -> Result<(), UsageError> {
    // Names that are not plain dates are not checked.
    let Ok(date) = NaiveDate::parse_from_str(tag, TAG_DATE_FORMAT) else {
        return Ok(());
    };
    if date.weekday() == Weekday::Fri {
        let suggestion = (date + Duration::days(4)).format(TAG_DATE_FORMAT).to_string();
        return Err(UsageError::FridayTag {
            tag: tag.to_string(),
            suggestion,
        });
    }
    Ok(())
}

/// Validate an operation before it is sent to any repository
pub fn check_operation(operation: &TagOperation) -> Result<(), UsageError> {
    if operation.tag == PLACEHOLDER_TAG {
        return Err(UsageError::PlaceholderTag);
    }
    check_weekday(&operation.tag)?;
    operation.validate()?;

    if !date_stamped().is_match(&operation.tag) {
        warn!(
            "{} is not a date-stamped tag name; comparison links assume tags sort by name",
            operation.tag
        );
    }
    Ok(())
}

/// Parse every repository argument, failing on the first bad one
pub fn parse_repositories(inputs: &[String], host: &str) -> Result<Vec<RepositoryRef>, UsageError> {
    if inputs.is_empty() {
        return Err(UsageError::NoRepositories);
    }
    inputs
        .iter()
        .map(|input| {
            RepositoryRef::parse(input, host).map_err(|source| UsageError::Repository {
                input: input.clone(),
                source,
            })
        })
        .collect()
}
