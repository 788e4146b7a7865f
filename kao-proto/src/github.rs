//! Inbound GitHub webhook payload shapes.
//!
//! Only the fields the relay actually reads are modeled; everything else
//! in a delivery is ignored by serde.

use serde::Deserialize;

/// Repository fragment common to all event payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
}

/// Borrow the repository name, falling back to `"unknown"`.
pub fn repo_name(repository: Option<&Repository>) -> &str {
    repository.map(|r| r.name.as_str()).unwrap_or("unknown")
}

/// `push` event: a batch of commits.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    pub repository: Option<Repository>,
}

/// One commit in a push batch.
#[derive(Debug, Clone, Deserialize)]
pub struct PushCommit {
    pub id: String,
    pub message: String,
    pub url: Option<String>,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    pub name: Option<String>,
}

impl PushCommit {
    /// Short (7 character) commit hash.
    ///
    /// Commit ids are hex in practice, but the field is attacker
    /// supplied; truncation floors to a char boundary so an arbitrary
    /// UTF-8 id cannot panic the handler.
    pub fn short_sha(&self) -> &str {
        let mut end = self.id.len().min(7);
        while !self.id.is_char_boundary(end) {
            end -= 1;
        }
        &self.id[..end]
    }

    /// First line of the commit message.
    pub fn first_line(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or("unknown")
    }
}

/// `pull_request` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: Option<String>,
    #[serde(default)]
    pub merged: bool,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

impl PullRequestPayload {
    /// The action as the relay sees it: a closed PR with `merged: true`
    /// is reported as `merged` regardless of the raw action string.
    pub fn resolved_action(&self) -> &str {
        if self.pull_request.merged {
            "merged"
        } else {
            &self.action
        }
    }

    pub fn author_login(&self) -> &str {
        self.pull_request
            .user
            .as_ref()
            .map(|u| u.login.as_str())
            .unwrap_or("unknown")
    }
}

/// `check_run` event (CI).
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRunPayload {
    pub check_run: CheckRun,
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_payload_parses_with_extra_fields() {
        let json = r#"{
            "ref": "refs/heads/main",
            "commits": [
                {"id": "0123456789abcdef", "message": "fix: thing\n\ndetails", "url": "https://x", "author": {"name": "dev"}}
            ],
            "repository": {"name": "kao", "full_name": "dev/kao"}
        }"#;
        let payload: PushPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.commits.len(), 1);
        let commit = &payload.commits[0];
        assert_eq!(commit.short_sha(), "0123456");
        assert_eq!(commit.first_line(), "fix: thing");
        assert_eq!(commit.author_name(), "dev");
        assert_eq!(repo_name(payload.repository.as_ref()), "kao");
    }

    #[test]
    fn merged_wins_over_closed_action() {
        let json = r#"{
            "action": "closed",
            "pull_request": {"number": 7, "title": "Add relay", "merged": true},
            "repository": {"name": "kao"}
        }"#;
        let payload: PullRequestPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.resolved_action(), "merged");
        assert_eq!(payload.author_login(), "unknown");
    }

    #[test]
    fn short_sha_handles_non_ascii_ids() {
        let commit = PushCommit {
            id: "ééééé".to_owned(),
            message: String::new(),
            url: None,
            author: None,
        };
        // 10 bytes, 5 chars; byte 7 splits the fourth é.
        assert_eq!(commit.short_sha(), "ééé");

        let short = PushCommit {
            id: "abc".to_owned(),
            message: String::new(),
            url: None,
            author: None,
        };
        assert_eq!(short.short_sha(), "abc");
    }

    #[test]
    fn missing_repository_falls_back_to_unknown() {
        let payload: PushPayload = serde_json::from_str(r#"{"commits":[]}"#).unwrap();
        assert_eq!(repo_name(payload.repository.as_ref()), "unknown");
    }
}
