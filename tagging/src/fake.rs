//! In-memory git for unit tests
//!
//! Models one working copy plus its `origin`: commits, a HEAD, branches and two
//! tag namespaces. Every command is recorded so tests can assert on what the
//! engine asked for.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use vcs::{CommandOutput, Gateway, GatewayResult, GitCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
struct FakeTag {
    commit: String,
    /// Set for annotated tags only
    tagger_time: Option<u64>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
enum Head {
    Branch(String),
    Detached(String),
}

#[derive(Debug)]
struct FakeState {
    next_commit: u64,
    clock: u64,
    commits: BTreeSet<String>,
    branches: BTreeMap<String, String>,
    head: Head,
    local_tags: BTreeMap<String, FakeTag>,
    remote_tags: BTreeMap<String, FakeTag>,
    conflicts: BTreeSet<String>,
    change_in_progress: bool,
    fail_clone: bool,
    pushes_allowed: Option<usize>,
    invocations: Vec<GitCommand>,
}

impl FakeState {
    fn new() -> Self {
        let mut state = Self {
            next_commit: 1,
            clock: 1_700_000_000,
            commits: BTreeSet::new(),
            branches: BTreeMap::new(),
            head: Head::Branch("master".to_string()),
            local_tags: BTreeMap::new(),
            remote_tags: BTreeMap::new(),
            conflicts: BTreeSet::new(),
            change_in_progress: false,
            fail_clone: false,
            pushes_allowed: None,
            invocations: Vec::new(),
        };
        let root = state.new_commit();
        state.branches.insert("master".to_string(), root);
        state
    }

    fn new_commit(&mut self) -> String {
        let id = format!("c{}", self.next_commit);
        self.next_commit += 1;
        self.commits.insert(id.clone());
        id
    }

    fn tick(&mut self) -> u64 {
        self.clock += 60;
        self.clock
    }

    fn head_commit(&self) -> String {
        match &self.head {
            Head::Branch(branch) => self.branches.get(branch).cloned().unwrap_or_default(),
            Head::Detached(commit) => commit.clone(),
        }
    }

    /// Commit on top of HEAD, advancing the branch if one is checked out
    fn commit_on_head(&mut self) -> String {
        let commit = self.new_commit();
        match &self.head {
            Head::Branch(branch) => {
                self.branches.insert(branch.clone(), commit.clone());
            }
            Head::Detached(_) => self.head = Head::Detached(commit.clone()),
        }
        commit
    }

    fn resolve(&self, reference: &str) -> Option<String> {
        if let Some(tag) = self.local_tags.get(reference) {
            return Some(tag.commit.clone());
        }
        if let Some(commit) = self.branches.get(reference) {
            return Some(commit.clone());
        }
        self.commits.contains(reference).then(|| reference.to_string())
    }

    fn seed_tag(&mut self, name: &str, annotated: bool) {
        let commit = self.commit_on_head();
        let tagger_time = annotated.then(|| self.tick());
        let message = annotated.then(|| format!("Release {}", name));
        let tag = FakeTag {
            commit,
            tagger_time,
            message,
        };
        self.local_tags.insert(name.to_string(), tag.clone());
        self.remote_tags.insert(name.to_string(), tag);
    }

    fn execute(&mut self, command: &GitCommand) -> CommandOutput {
        match command {
            GitCommand::Clone { dir, .. } => {
                if self.fail_clone {
                    return failure(128, "fatal: repository not found");
                }
                match std::fs::create_dir_all(dir.join(".git")) {
                    Ok(()) => ok(""),
                    Err(e) => failure(128, &e.to_string()),
                }
            }
            GitCommand::Checkout { reference } => {
                if self.branches.contains_key(reference) {
                    self.head = Head::Branch(reference.clone());
                    ok("")
                } else if let Some(commit) = self.resolve(reference) {
                    self.head = Head::Detached(commit);
                    ok("")
                } else {
                    failure(
                        1,
                        &format!("error: pathspec '{}' did not match", reference),
                    )
                }
            }
            GitCommand::FetchTags { .. } => {
                self.local_tags = self.remote_tags.clone();
                ok("")
            }
            GitCommand::Pull { .. } => ok("Already up to date."),
            GitCommand::Tag {
                name,
                annotation,
                target,
            } => {
                if self.local_tags.contains_key(name) {
                    return failure(128, &format!("fatal: tag '{}' already exists", name));
                }
                let commit = match target {
                    Some(target) => match self.resolve(target) {
                        Some(commit) => commit,
                        None => return failure(128, &format!("fatal: Failed to resolve '{}'", target)),
                    },
                    None => self.head_commit(),
                };
                let tagger_time = annotation.as_ref().map(|_| self.tick());
                self.local_tags.insert(
                    name.clone(),
                    FakeTag {
                        commit,
                        tagger_time,
                        message: annotation.clone(),
                    },
                );
                ok("")
            }
            GitCommand::TagMessage { name } => match self.local_tags.get(name) {
                Some(FakeTag {
                    message: Some(message),
                    ..
                }) => ok(&format!("{}\n", message)),
                _ => ok(""),
            },
            GitCommand::DeleteTag { name } => match self.local_tags.remove(name) {
                Some(_) => ok(&format!("Deleted tag '{}'", name)),
                None => failure(1, &format!("error: tag '{}' not found.", name)),
            },
            GitCommand::PushTags => {
                if let Some(allowed) = self.pushes_allowed {
                    if allowed == 0 {
                        return failure(1, "! [remote rejected] (pre-receive hook declined)");
                    }
                    self.pushes_allowed = Some(allowed - 1);
                }
                let mut rejected = Vec::new();
                for (name, tag) in &self.local_tags {
                    let remote = self.remote_tags.get(name).map(|r| r.commit.clone());
                    match remote {
                        None => {
                            self.remote_tags.insert(name.clone(), tag.clone());
                        }
                        Some(commit) if commit != tag.commit => rejected.push(name.clone()),
                        Some(_) => {}
                    }
                }
                if rejected.is_empty() {
                    ok("")
                } else {
                    failure(1, &format!("! [rejected] {} (already exists)", rejected.join(", ")))
                }
            }
            GitCommand::DeleteRemoteTag { name, .. } => match self.remote_tags.remove(name) {
                Some(_) => ok(""),
                None => failure(
                    1,
                    &format!("error: unable to delete '{}': remote ref does not exist", name),
                ),
            },
            GitCommand::CherryPick { sha } | GitCommand::Revert { sha } => {
                if self.conflicts.contains(sha) {
                    self.change_in_progress = true;
                    return failure(1, &format!("error: could not apply {}", sha));
                }
                self.commit_on_head();
                ok("")
            }
            GitCommand::CherryPickAbort | GitCommand::RevertAbort => {
                if self.change_in_progress {
                    self.change_in_progress = false;
                    ok("")
                } else {
                    failure(128, "error: no cherry-pick or revert in progress")
                }
            }
            GitCommand::RevParse { reference } => match self.resolve(reference) {
                Some(commit) => ok(&format!("{}\n", commit)),
                None => failure(128, "fatal: Needed a single revision"),
            },
            GitCommand::ForEachTag {
                sort,
                format,
                count,
            } => {
                let mut tags: Vec<(&String, &FakeTag)> = self.local_tags.iter().collect();
                // Stable sorts applied in order: the last key ends up primary.
                for key in sort {
                    let (descending, key) = match key.strip_prefix('-') {
                        Some(key) => (true, key),
                        None => (false, key.as_str()),
                    };
                    tags.sort_by(|(a_name, a), (b_name, b)| {
                        let ordering = match key {
                            "taggerdate" => a
                                .tagger_time
                                .unwrap_or(0)
                                .cmp(&b.tagger_time.unwrap_or(0)),
                            _ => a_name.cmp(b_name),
                        };
                        if descending {
                            ordering.reverse()
                        } else {
                            ordering
                        }
                    });
                }
                let limit = count.unwrap_or(usize::MAX);
                let lines: Vec<String> = tags
                    .into_iter()
                    .take(limit)
                    .map(|(name, tag)| render(format, name, tag))
                    .collect();
                ok(&lines.iter().map(|line| format!("{}\n", line)).collect::<String>())
            }
        }
    }
}

fn render(format: &str, name: &str, tag: &FakeTag) -> String {
    let date = tag
        .tagger_time
        .map(|t| format!("@{} +0000", t))
        .unwrap_or_default();
    format
        .replace("%(refname:strip=2)", name)
        .replace("%(taggerdate)", &date)
        .replace("%09", "\t")
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        status: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failure(status: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        status: Some(status),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Cloneable handle; clones share state
#[derive(Clone)]
pub struct FakeGit {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Commit on master and tag it with a tag object, locally and on the remote
    pub fn with_annotated_tag(self, name: &str) -> Self {
        self.state().seed_tag(name, true);
        self
    }

    /// Commit on master and tag it with a bare ref, locally and on the remote
    pub fn with_lightweight_tag(self, name: &str) -> Self {
        self.state().seed_tag(name, false);
        self
    }

    pub fn failing_clones(self) -> Self {
        self.state().fail_clone = true;
        self
    }

    /// Cherry-picking or reverting `sha` stops with a conflict
    pub fn with_conflict(self, sha: &str) -> Self {
        self.state().conflicts.insert(sha.to_string());
        self
    }

    /// Accept `allowed` pushes of tags, reject every one after that
    pub fn rejecting_pushes_after(self, allowed: usize) -> Self {
        self.state().pushes_allowed = Some(allowed);
        self
    }

    /// Move a remote tag to a fresh commit, as another clone re-tagging would
    pub fn move_remote_tag(&self, tag: &str) -> String {
        let mut state = self.state();
        let commit = state.new_commit();
        if let Some(remote) = state.remote_tags.get_mut(tag) {
            remote.commit = commit.clone();
        }
        commit
    }

    /// Delete a tag on the remote only
    pub fn drop_remote_tag(&self, tag: &str) {
        self.state().remote_tags.remove(tag);
    }

    pub fn invocations(&self) -> Vec<GitCommand> {
        self.state().invocations.clone()
    }

    pub fn count(&self, predicate: impl Fn(&GitCommand) -> bool) -> usize {
        self.state()
            .invocations
            .iter()
            .filter(|command| predicate(command))
            .count()
    }

    pub fn local_tags(&self) -> Vec<String> {
        self.state().local_tags.keys().cloned().collect()
    }

    /// Commit the local tag points to
    pub fn target(&self, tag: &str) -> Option<String> {
        self.state().local_tags.get(tag).map(|t| t.commit.clone())
    }

    pub fn remote_target(&self, tag: &str) -> Option<String> {
        self.state().remote_tags.get(tag).map(|t| t.commit.clone())
    }

    /// Annotation message of the local tag
    pub fn message(&self, tag: &str) -> Option<String> {
        self.state()
            .local_tags
            .get(tag)
            .and_then(|t| t.message.clone())
    }

    pub fn remote_has(&self, tag: &str) -> bool {
        self.state().remote_tags.contains_key(tag)
    }
}

#[async_trait]
impl Gateway for FakeGit {
    async fn run(&self, _dir: &Path, command: &GitCommand) -> GatewayResult<CommandOutput> {
        let mut state = self.state();
        state.invocations.push(command.clone());
        Ok(state.execute(command))
    }

    fn is_dry_run(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_for_each_tag_sorts_like_git() {
        let git = FakeGit::new()
            .with_annotated_tag("b")
            .with_annotated_tag("a")
            .with_lightweight_tag("c");
        let command = GitCommand::ForEachTag {
            sort: vec!["-refname".to_string(), "-taggerdate".to_string()],
            format: "%(refname:strip=2)".to_string(),
            count: None,
        };
        let output = git.run(Path::new("."), &command).await.unwrap();
        // Newest tag date first; the lightweight tag has none and sorts last.
        assert_eq!(output.stdout_lines().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_push_rejects_moved_tag() {
        let git = FakeGit::new().with_lightweight_tag("t");
        let dir = Path::new(".");
        git.run(dir, &GitCommand::delete_tag("t")).await.unwrap();
        git.run(dir, &GitCommand::CherryPick { sha: "x".into() })
            .await
            .unwrap();
        git.run(dir, &GitCommand::lightweight_tag("t")).await.unwrap();
        let output = git.run(dir, &GitCommand::PushTags).await.unwrap();
        assert!(!output.success());
    }
}
