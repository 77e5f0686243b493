use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Host used to expand `team/name` shorthand when none is configured
pub const DEFAULT_HOST: &str = "github.com";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Repository reference is empty")]
    Empty,

    #[error("Repository reference '{0}' must name exactly a team and a repository (team/name)")]
    InvalidPath(String),
}

/// A remote repository, identified by team and name
///
/// # Examples
///
/// ```
/// use tagging::RepositoryRef;
///
/// let short = RepositoryRef::parse("mozilla/fireplace", "github.com").unwrap();
/// assert_eq!(short.remote_url, "git@github.com:mozilla/fireplace.git");
///
/// let full = RepositoryRef::parse("git@github.com:mozilla/fireplace.git", "github.com").unwrap();
/// assert_eq!(full, short);
/// assert_eq!(full.short_name(), "mozilla/fireplace");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Namespace owner
    pub team: String,
    /// Repository name, without `.git`
    pub name: String,
    /// Canonical clone URL
    pub remote_url: String,
}

impl RepositoryRef {
    /// Parse `team/name`, `git@host:team/name(.git)` or `scheme://host/team/name(.git)`
    ///
    /// Shorthand expands to an SSH remote on `host`. Full URLs are kept as given,
    /// with a `.git` suffix added when missing; their last two path segments name
    /// the team and the repository.
    pub fn parse(input: &str, host: &str) -> Result<Self, ReferenceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let (team, name, remote_url) = if let Some((_, rest)) = input.split_once("://") {
            // scheme://[user@]host[:port]/.../team/name
            let (_, path) = rest
                .split_once('/')
                .ok_or_else(|| ReferenceError::InvalidPath(input.to_string()))?;
            let (team, name) = trailing_team_name(path)
                .ok_or_else(|| ReferenceError::InvalidPath(input.to_string()))?;
            (team, name, with_git_suffix(input))
        } else if let Some((_, path)) = input.split_once(':') {
            // scp-like: git@host:team/name
            let (team, name) = trailing_team_name(path)
                .ok_or_else(|| ReferenceError::InvalidPath(input.to_string()))?;
            (team, name, with_git_suffix(input))
        } else {
            let (team, name) = exact_team_name(input)
                .ok_or_else(|| ReferenceError::InvalidPath(input.to_string()))?;
            (team, name, String::new())
        };

        let remote_url = if remote_url.is_empty() {
            format!("git@{}:{}/{}.git", host, team, name)
        } else {
            remote_url
        };

        Ok(Self {
            team: team.to_string(),
            name: name.to_string(),
            remote_url,
        })
    }

    /// `team/name`
    pub fn short_name(&self) -> String {
        format!("{}/{}", self.team, self.name)
    }

    /// Directory name of the local clone: alphanumerics of `team/name`, joined by `__`
    pub fn local_dir_name(&self) -> String {
        format!("{}__{}", sanitize(&self.team), sanitize(&self.name))
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.team, self.name)
    }
}

impl FromStr for RepositoryRef {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_HOST)
    }
}

fn with_git_suffix(url: &str) -> String {
    if url.ends_with(".git") {
        url.to_string()
    } else {
        format!("{}.git", url)
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

fn strip_path(path: &str) -> &str {
    let path = path.trim_matches('/');
    path.strip_suffix(".git").unwrap_or(path)
}

fn exact_team_name(path: &str) -> Option<(&str, &str)> {
    let (team, name) = strip_path(path).split_once('/')?;
    (valid_segment(team) && valid_segment(name) && !name.contains('/')).then_some((team, name))
}

fn trailing_team_name(path: &str) -> Option<(&str, &str)> {
    let (rest, name) = strip_path(path).rsplit_once('/')?;
    let team = rest.rsplit('/').next()?;
    (valid_segment(team) && valid_segment(name)).then_some((team, name))
}

fn sanitize(segment: &str) -> String {
    segment.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// A local clone bound to one [`RepositoryRef`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    pub repository: RepositoryRef,
    pub path: PathBuf,
}

impl WorkingCopy {
    pub fn new(repository: RepositoryRef, path: impl Into<PathBuf>) -> Self {
        Self {
            repository,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
