//! Fixtures: bare remotes built with git2, drivers running the real git binary
#![allow(dead_code)]

use git2::{ObjectType, Oid, Repository, Signature, Time};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagging::{EngineConfig, Locator, RecoveryPolicy, RepositoryRef, TagConvention, DEFAULT_HOST};
use tagz::{Driver, DriverConfig, FailurePolicy};
use tempfile::TempDir;
use vcs::{GatewayConfig, GitGateway};

pub const WEB_BASE: &str = "https://github.example.com";

/// 2024-01-01T10:00:00Z
pub const JAN_1: i64 = 1_704_103_200;
pub const WEEK: i64 = 7 * 24 * 60 * 60;

/// True (with a note on stderr) when git is not installed and the test should return
pub fn git_missing() -> bool {
    if vcs::git_available() {
        return false;
    }
    eprintln!("Skipping test - git not available");
    true
}

/// A bare `origin` at `<tmp>/remotes/<team>/<name>.git` with one commit on master
pub struct Remote {
    pub path: PathBuf,
    pub repo: Repository,
    pub master: Oid,
}

impl Remote {
    pub fn new(root: &Path, team: &str, name: &str) -> Self {
        let path = root.join("remotes").join(team).join(format!("{}.git", name));
        std::fs::create_dir_all(&path).unwrap();
        let repo = Repository::init_bare(&path).unwrap();
        let master = commit(&repo, "master", None, "README", "hello\n", JAN_1);
        repo.set_head("refs/heads/master").unwrap();
        Self { path, repo, master }
    }

    pub fn reference(&self) -> RepositoryRef {
        RepositoryRef::parse(&format!("file://{}", self.path.display()), DEFAULT_HOST).unwrap()
    }

    /// Write `file` on `branch` in a commit on top of `parent`
    pub fn commit_on(&self, branch: &str, parent: Oid, file: &str, contents: &str) -> Oid {
        commit(&self.repo, branch, Some(parent), file, contents, JAN_1 + 60)
    }

    /// Move master forward by one commit; tags added afterwards point at it
    pub fn advance_master(&mut self, file: &str, contents: &str) -> Oid {
        self.master = commit(&self.repo, "master", Some(self.master), file, contents, JAN_1 + 120);
        self.master
    }

    pub fn has_file(&self, commit: Oid, file: &str) -> bool {
        let tree = self.repo.find_commit(commit).unwrap().tree().unwrap();
        let found = tree.get_name(file).is_some();
        found
    }

    pub fn annotated_tag(&self, name: &str, tagged_at: i64) {
        let target = self.repo.find_object(self.master, None).unwrap();
        let tagger = signature(tagged_at);
        self.repo
            .tag(name, &target, &tagger, &format!("Release {}", name), false)
            .unwrap();
    }

    pub fn lightweight_tag(&self, name: &str) {
        let target = self.repo.find_object(self.master, None).unwrap();
        self.repo.tag_lightweight(name, &target, false).unwrap();
    }

    /// Re-point a tag at `target`, as a cherry-pick from another clone would
    pub fn move_tag(&self, name: &str, target: Oid) {
        let target = self.repo.find_object(target, None).unwrap();
        self.repo.tag_lightweight(name, &target, true).unwrap();
    }

    pub fn delete_tag(&self, name: &str) {
        self.repo.tag_delete(name).unwrap();
    }

    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .repo
            .tag_names(None)
            .unwrap()
            .iter()
            .flatten()
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    /// Commit the tag resolves to on the remote
    pub fn tag_target(&self, name: &str) -> Option<Oid> {
        let object = self
            .repo
            .revparse_single(&format!("refs/tags/{}", name))
            .ok()?;
        Some(object.peel_to_commit().ok()?.id())
    }

    /// Message of an annotated tag, without the trailing newline
    pub fn tag_message(&self, name: &str) -> Option<String> {
        let object = self
            .repo
            .revparse_single(&format!("refs/tags/{}", name))
            .ok()?;
        let tag = object.as_tag()?;
        tag.message().map(|message| message.trim_end().to_string())
    }

    pub fn is_annotated(&self, name: &str) -> bool {
        self.repo
            .revparse_single(&format!("refs/tags/{}", name))
            .map(|object| object.kind() == Some(ObjectType::Tag))
            .unwrap_or(false)
    }
}

fn signature(seconds: i64) -> Signature<'static> {
    Signature::new("Release Bot", "release@example.com", &Time::new(seconds, 0)).unwrap()
}

fn commit(
    repo: &Repository,
    branch: &str,
    parent: Option<Oid>,
    file: &str,
    contents: &str,
    seconds: i64,
) -> Oid {
    let parent = parent.map(|oid| repo.find_commit(oid).unwrap());
    let parent_tree = parent.as_ref().map(|c| c.tree().unwrap());

    let blob = repo.blob(contents.as_bytes()).unwrap();
    let mut builder = repo.treebuilder(parent_tree.as_ref()).unwrap();
    builder.insert(file, blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let sig = signature(seconds);
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(
        Some(&format!("refs/heads/{}", branch)),
        &sig,
        &sig,
        &format!("Add {}", file),
        &tree,
        &parents,
    )
    .unwrap()
}

/// Gateway running the real git with a fixed identity and no user config
pub fn gateway(dry_run: bool) -> GitGateway {
    GitGateway::new(
        GatewayConfig::new()
            .with_dry_run(dry_run)
            .with_env("GIT_AUTHOR_NAME", "Release Bot")
            .with_env("GIT_AUTHOR_EMAIL", "release@example.com")
            .with_env("GIT_COMMITTER_NAME", "Release Bot")
            .with_env("GIT_COMMITTER_EMAIL", "release@example.com")
            .with_env("GIT_CONFIG_NOSYSTEM", "1")
            .with_env("GIT_CONFIG_GLOBAL", "/dev/null"),
    )
}

pub struct Setup {
    pub convention: TagConvention,
    pub jobs: usize,
    pub failure_policy: FailurePolicy,
    pub recovery: RecoveryPolicy,
    pub dry_run: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            convention: TagConvention::Lightweight,
            jobs: 1,
            failure_policy: FailurePolicy::ContinueOnError,
            recovery: RecoveryPolicy::Manual,
            dry_run: false,
        }
    }
}

impl Setup {
    pub fn driver(self, root: &TempDir) -> Driver {
        Driver::new(
            Arc::new(gateway(self.dry_run)),
            Locator::new(root.path().join("clones")),
            EngineConfig::default().with_recovery(self.recovery),
            DriverConfig::new()
                .with_requested_convention(self.convention)
                .with_web_base(WEB_BASE)
                .with_jobs(self.jobs)
                .with_failure_policy(self.failure_policy),
        )
        .unwrap()
    }
}
