use std::fmt;
use std::path::PathBuf;

/// A git subcommand the gateway knows how to run
///
/// The set is closed on purpose: it is exactly the protocol the tagging engine
/// speaks, which keeps dry-run classification and test doubles exhaustive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCommand {
    /// `git clone <url> <dir>`
    Clone { url: String, dir: PathBuf },
    /// `git checkout <reference>`
    Checkout { reference: String },
    /// `git fetch <remote> --tags --force --prune --prune-tags`
    ///
    /// Local tags are made to mirror the remote: moved tags are overwritten
    /// and tags deleted on the remote are pruned.
    FetchTags { remote: String },
    /// `git pull` or `git pull --rebase`
    Pull { rebase: bool },
    /// `git tag <name>` or `git tag -a <name> -m <message>`, optionally at `target`
    Tag {
        name: String,
        annotation: Option<String>,
        target: Option<String>,
    },
    /// `git tag -d <name>`
    DeleteTag { name: String },
    /// `git tag --list --format=%(contents) <name>`
    TagMessage { name: String },
    /// `git push --tags`
    PushTags,
    /// `git push <remote> :<name>`
    DeleteRemoteTag { remote: String, name: String },
    /// `git cherry-pick <sha>`
    CherryPick { sha: String },
    /// `git cherry-pick --abort`
    CherryPickAbort,
    /// `git revert --no-edit <sha>`
    Revert { sha: String },
    /// `git revert --abort`
    RevertAbort,
    /// `git rev-parse --verify <reference>^{commit}`
    RevParse { reference: String },
    /// `git for-each-ref --sort=<key>... --format=<format> [--count=<n>] refs/tags`
    ForEachTag {
        sort: Vec<String>,
        format: String,
        count: Option<usize>,
    },
}

impl GitCommand {
    pub fn checkout(reference: impl Into<String>) -> Self {
        Self::Checkout {
            reference: reference.into(),
        }
    }

    pub fn lightweight_tag(name: impl Into<String>) -> Self {
        Self::Tag {
            name: name.into(),
            annotation: None,
            target: None,
        }
    }

    pub fn annotated_tag(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tag {
            name: name.into(),
            annotation: Some(message.into()),
            target: None,
        }
    }

    /// Point a `Tag` command at an explicit commit instead of HEAD
    pub fn at(self, commit: impl Into<String>) -> Self {
        match self {
            Self::Tag {
                name, annotation, ..
            } => Self::Tag {
                name,
                annotation,
                target: Some(commit.into()),
            },
            other => other,
        }
    }

    pub fn fetch_tags(remote: impl Into<String>) -> Self {
        Self::FetchTags {
            remote: remote.into(),
        }
    }

    pub fn tag_message(name: impl Into<String>) -> Self {
        Self::TagMessage { name: name.into() }
    }

    pub fn delete_tag(name: impl Into<String>) -> Self {
        Self::DeleteTag { name: name.into() }
    }

    pub fn delete_remote_tag(remote: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DeleteRemoteTag {
            remote: remote.into(),
            name: name.into(),
        }
    }

    pub fn rev_parse(reference: impl Into<String>) -> Self {
        Self::RevParse {
            reference: reference.into(),
        }
    }

    /// Render the argument vector passed to the git binary
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Clone { url, dir } => vec![
                "clone".to_string(),
                url.clone(),
                dir.to_string_lossy().into_owned(),
            ],
            Self::Checkout { reference } => vec!["checkout".to_string(), reference.clone()],
            Self::FetchTags { remote } => vec![
                "fetch".to_string(),
                remote.clone(),
                "--tags".to_string(),
                "--force".to_string(),
                "--prune".to_string(),
                "--prune-tags".to_string(),
            ],
            Self::Pull { rebase } => {
                let mut args = vec!["pull".to_string()];
                if *rebase {
                    args.push("--rebase".to_string());
                }
                args
            }
            Self::Tag {
                name,
                annotation,
                target,
            } => {
                let mut args = vec!["tag".to_string()];
                match annotation {
                    Some(message) => {
                        args.push("-a".to_string());
                        args.push(name.clone());
                        args.push("-m".to_string());
                        args.push(message.clone());
                    }
                    None => args.push(name.clone()),
                }
                if let Some(target) = target {
                    args.push(target.clone());
                }
                args
            }
            Self::DeleteTag { name } => vec!["tag".to_string(), "-d".to_string(), name.clone()],
            Self::TagMessage { name } => vec![
                "tag".to_string(),
                "--list".to_string(),
                "--format=%(contents)".to_string(),
                name.clone(),
            ],
            Self::PushTags => vec!["push".to_string(), "--tags".to_string()],
            Self::DeleteRemoteTag { remote, name } => {
                vec!["push".to_string(), remote.clone(), format!(":{}", name)]
            }
            Self::CherryPick { sha } => vec!["cherry-pick".to_string(), sha.clone()],
            Self::CherryPickAbort => vec!["cherry-pick".to_string(), "--abort".to_string()],
            // --no-edit: there is no terminal to open an editor on
            Self::Revert { sha } => vec![
                "revert".to_string(),
                "--no-edit".to_string(),
                sha.clone(),
            ],
            Self::RevertAbort => vec!["revert".to_string(), "--abort".to_string()],
            Self::RevParse { reference } => vec![
                "rev-parse".to_string(),
                "--verify".to_string(),
                format!("{}^{{commit}}", reference),
            ],
            Self::ForEachTag {
                sort,
                format,
                count,
            } => {
                let mut args = vec!["for-each-ref".to_string()];
                args.extend(sort.iter().map(|key| format!("--sort={}", key)));
                args.push(format!("--format={}", format));
                if let Some(count) = count {
                    args.push(format!("--count={}", count));
                }
                args.push("refs/tags".to_string());
                args
            }
        }
    }

    /// Whether running this command can change local or remote state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::RevParse { .. } | Self::ForEachTag { .. } | Self::TagMessage { .. }
        )
    }
}

impl fmt::Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "git {}", self.args().join(" "))
    }
}
