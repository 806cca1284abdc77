use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    error::LimitError,
    types::{Author, AuthorKind, EventSource, PullRequestRef, Repo},
};

/// Workflow events that carry a pull request payload.
pub const PULL_REQUEST_EVENTS: &[&str] = &["pull_request", "pull_request_target"];

/// The pull request that triggered this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub repo: Repo,
    pub pull_request: PullRequestRef,
    pub head_ref: String,
    pub base_ref: String,
}

#[derive(Debug, Deserialize)]
struct Payload {
    pull_request: Option<PayloadPullRequest>,
    repository: Option<PayloadRepository>,
}

#[derive(Debug, Deserialize)]
struct PayloadPullRequest {
    number: u64,
    node_id: String,
    #[serde(default)]
    draft: bool,
    created_at: DateTime<Utc>,
    user: PayloadUser,
    head: PayloadBranch,
    base: PayloadBranch,
}

#[derive(Debug, Deserialize)]
struct PayloadUser {
    login: String,
    #[serde(rename = "type", default)]
    typename: String,
}

#[derive(Debug, Deserialize)]
struct PayloadBranch {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct PayloadRepository {
    full_name: String,
}

impl PullRequestEvent {
    /// Validates the trigger and reads its payload from disk.
    ///
    /// The event name is checked before anything else so a run outside a
    /// pull request context fails without touching the payload or the API.
    pub fn load(source: &EventSource, repo: Option<&Repo>) -> Result<Self, LimitError> {
        ensure_pull_request_trigger(source.name.as_deref())?;

        let path = source
            .path
            .as_deref()
            .ok_or(LimitError::MissingRequiredConfig {
                name: "GITHUB_EVENT_PATH",
            })?;

        read_payload(path, repo).map_err(|source| LimitError::EventPayload {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses a pull request event payload.
    ///
    /// `repo` takes precedence over the payload's `repository.full_name`.
    pub fn from_payload(raw: &str, repo: Option<&Repo>) -> anyhow::Result<Self> {
        let payload: Payload = serde_json::from_str(raw).context("Malformed event JSON")?;
        let pr = payload
            .pull_request
            .context("Event payload has no 'pull_request' object")?;

        let repo = match repo {
            Some(repo) => repo.clone(),
            None => {
                let full_name = payload
                    .repository
                    .map(|r| r.full_name)
                    .context("Event payload has no repository and none was configured")?;
                Repo::parse(&full_name)?
            }
        };

        Ok(Self {
            repo,
            pull_request: PullRequestRef {
                number: pr.number,
                node_id: pr.node_id,
                author: Author {
                    login: pr.user.login,
                    kind: AuthorKind::from_typename(&pr.user.typename),
                },
                draft: pr.draft,
                created_at: pr.created_at,
            },
            head_ref: pr.head.name,
            base_ref: pr.base.name,
        })
    }
}

/// Fails with [`LimitError::InvalidTriggerContext`] unless `event_name`
/// names a pull request event.
pub fn ensure_pull_request_trigger(event_name: Option<&str>) -> Result<(), LimitError> {
    match event_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) if PULL_REQUEST_EVENTS.contains(&name) => Ok(()),
        Some(name) => Err(LimitError::InvalidTriggerContext {
            event: name.to_string(),
        }),
        None => Err(LimitError::InvalidTriggerContext {
            event: "<unset>".to_string(),
        }),
    }
}

fn read_payload(path: &Path, repo: Option<&Repo>) -> anyhow::Result<PullRequestEvent> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    PullRequestEvent::from_payload(&raw, repo)
}
