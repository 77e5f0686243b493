use crate::driver::FailurePolicy;
use crate::settings::{load_repos_file, Settings, SettingsResult};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tagging::{RecoveryPolicy, TagCommand, TagConvention, TagOperation};

const EXAMPLES: &str = "\
Examples:
  tagz -r mozilla/fireplace -c create -t 2024.01.15
  tagz -r mozilla/fireplace,mozilla/zamboni -c create -t 2024.01.15
  tagz -r mozilla/fireplace -c delete -t 2024.01.15
  tagz -r mozilla/fireplace -c cherrypick -t 2024.01.15 -s b4dc0ffee
  tagz -r mozilla/fireplace -c revert -t 2024.01.15 -s b4dc0ffee";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CommandKind {
    /// Tag the primary branch and push the tag
    Create,
    /// Delete the tag locally and on the remote
    Delete,
    /// Apply a commit on top of an existing tag and move the tag
    Cherrypick,
    /// Revert a commit on top of an existing tag and move the tag
    Revert,
}

#[derive(Parser, Debug)]
#[command(name = "tagz", version)]
#[command(about = "Create, delete, cherry-pick onto and revert release tags across repositories")]
#[command(after_help = EXAMPLES)]
pub struct Args {
    /// Command to run
    #[arg(short = 'c', long = "command", value_enum)]
    pub command: CommandKind,

    /// Repository as team/name or a remote URL; comma separated or repeated
    #[arg(short = 'r', long = "repo", value_delimiter = ',')]
    pub repos: Vec<String>,

    /// File with one repository per line (`#` starts a comment)
    #[arg(long, value_name = "PATH")]
    pub repos_file: Option<PathBuf>,

    /// Name of the tag, e.g. 2024.01.15
    #[arg(short = 't', long)]
    pub tag: String,

    /// Commit to cherry-pick or revert
    #[arg(short = 's', long)]
    pub sha: Option<String>,

    /// Create annotated tags in repositories that have no tags yet
    #[arg(long, conflicts_with = "lightweight")]
    pub annotated: bool,

    /// Create lightweight tags in repositories that have no tags yet (default)
    #[arg(long)]
    pub lightweight: bool,

    /// Message for annotated tags (defaults to the tag name)
    #[arg(short = 'm', long)]
    pub message: Option<String>,

    /// Make lots of noise
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Show git actions to perform but don't do them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Repositories processed at once
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Stop starting new repositories after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Restore the tag at its original commit if a cherry-pick or revert fails
    #[arg(long)]
    pub rollback: bool,

    /// Print links without copying them to the clipboard
    #[arg(long)]
    pub no_clipboard: bool,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Settings file
    #[arg(long, env = "TAGZ_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn operation(&self) -> TagOperation {
        let sha = || self.sha.as_deref().unwrap_or_default().trim().to_string();
        let command = match self.command {
            CommandKind::Create => TagCommand::Create,
            CommandKind::Delete => TagCommand::Delete,
            CommandKind::Cherrypick => TagCommand::CherryPick { sha: sha() },
            CommandKind::Revert => TagCommand::Revert { sha: sha() },
        };

        let operation = TagOperation::new(command, self.tag.trim());
        match &self.message {
            Some(message) => operation.with_message(message.clone()),
            None => operation,
        }
    }

    pub fn requested_convention(&self) -> TagConvention {
        if self.annotated {
            TagConvention::Annotated
        } else {
            TagConvention::Lightweight
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::ContinueOnError
        }
    }

    /// Overlay command-line flags on `settings`
    ///
    /// Repositories from `--repo` and `--repos-file` replace the settings list.
    pub fn apply_to(&self, mut settings: Settings) -> SettingsResult<Settings> {
        let mut repos: Vec<String> = self
            .repos
            .iter()
            .map(|repo| repo.trim().to_string())
            .filter(|repo| !repo.is_empty())
            .collect();
        if let Some(path) = &self.repos_file {
            repos.extend(load_repos_file(path)?);
        }
        if !repos.is_empty() {
            settings.repos = repos;
        }

        if let Some(jobs) = self.jobs {
            settings.jobs = jobs;
        }
        if self.rollback {
            settings.recovery = RecoveryPolicy::Rollback;
        }
        if self.no_clipboard {
            settings.clipboard = false;
        }
        Ok(settings)
    }
}
