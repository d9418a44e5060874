//! Task identity and the process-wide repository coordinate cache.
//!
//! Parsing a source URL into `owner/repo` coordinates is the one sliver of
//! code-hosting wire format this core touches; the rest (issue bodies,
//! comments, PR creation) lives with the host's own client.

use crate::ids::TaskId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `owner/name` repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoCoordinates {
    pub owner: String,
    pub name: String,
}

impl RepoCoordinates {
    /// Parse `owner/name` out of a GitHub-style issue URL
    /// (`https://github.com/<owner>/<repo>/issues/<n>`).
    #[must_use]
    pub fn from_issue_url(url: &str) -> Option<Self> {
        let parts: Vec<&str> = url.trim_end_matches('/').split('/').collect();
        if parts.len() < 4 {
            return None;
        }
        let name = parts[parts.len() - 3];
        let owner = parts[parts.len() - 4];
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// What the host supplies to start a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub source_url: String,
    pub repository: RepoCoordinates,
}

/// Process-wide, copy-on-first-use cache of resolved repository coordinates.
///
/// Safe to populate concurrently: `DashMap` shards its internal locking so
/// distinct keys don't contend, rather than a single global `Mutex`
/// serializing unrelated repositories.
#[derive(Debug, Clone, Default)]
pub struct RepoCache {
    inner: Arc<DashMap<String, RepoCoordinates>>,
}

impl RepoCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached coordinates for `url`, resolving and inserting on
    /// first use.
    #[must_use]
    pub fn get_or_resolve(&self, url: &str) -> Option<RepoCoordinates> {
        if let Some(existing) = self.inner.get(url) {
            return Some(existing.clone());
        }
        let resolved = RepoCoordinates::from_issue_url(url)?;
        self.inner.insert(url.to_string(), resolved.clone());
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issue_url() {
        let coords =
            RepoCoordinates::from_issue_url("https://github.com/octocat/hello-world/issues/42")
                .unwrap();
        assert_eq!(coords.owner, "octocat");
        assert_eq!(coords.name, "hello-world");
        assert_eq!(coords.full_name(), "octocat/hello-world");
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(RepoCoordinates::from_issue_url("not a url").is_none());
    }

    #[test]
    fn cache_resolves_once_and_reuses() {
        let cache = RepoCache::new();
        let url = "https://github.com/octocat/hello-world/issues/1";
        let first = cache.get_or_resolve(url).unwrap();
        let second = cache.get_or_resolve(url).unwrap();
        assert_eq!(first, second);
    }
}
