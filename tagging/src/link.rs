use crate::ranker::TagPair;
use crate::repository::RepositoryRef;
use serde::{Deserialize, Serialize};

/// A comparison between two tags of one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonLink {
    pub team: String,
    pub repo_name: String,
    pub previous_tag: String,
    pub current_tag: String,
}

impl ComparisonLink {
    pub fn new(repository: &RepositoryRef, pair: &TagPair) -> Self {
        Self {
            team: repository.team.clone(),
            repo_name: repository.name.clone(),
            previous_tag: pair.previous.clone(),
            current_tag: pair.latest.clone(),
        }
    }

    /// `<web_base>/<team>/<repo>/compare/<previous>...<current>`
    pub fn url(&self, web_base: &str) -> String {
        format!(
            "{}/compare/{}...{}",
            self.repository_url(web_base),
            self.previous_tag,
            self.current_tag
        )
    }

    /// `<web_base>/<team>/<repo>/releases/tag/<current>`
    pub fn release_url(&self, web_base: &str) -> String {
        format!(
            "{}/releases/tag/{}",
            self.repository_url(web_base),
            self.current_tag
        )
    }

    fn repository_url(&self, web_base: &str) -> String {
        format!(
            "{}/{}/{}",
            web_base.trim_end_matches('/'),
            self.team,
            self.repo_name
        )
    }
}
