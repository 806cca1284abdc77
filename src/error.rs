use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Side effect requested by a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemedialAction {
    Comment,
    Close,
}

impl fmt::Display for RemedialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemedialAction::Comment => write!(f, "comment on"),
            RemedialAction::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LimitError {
    /// Invoked by something other than a pull request event.
    #[error("This action should only run when the event is a pull request but it is a {event}")]
    InvalidTriggerContext { event: String },

    /// The event payload could not be read or lacks pull request fields.
    #[error("Invalid event payload at {}", .path.display())]
    EventPayload {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Input required and not supplied: {name}")]
    MissingRequiredConfig { name: &'static str },

    #[error("Failed to count open pull requests of {author} in {repo}")]
    CountRetrieval {
        author: String,
        repo: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to {action} pull request #{number}")]
    ActionApplication {
        action: RemedialAction,
        number: u64,
        #[source]
        source: anyhow::Error,
    },

    /// `others` is the value compared against `limit`.
    #[error(
        "PR author {author} currently has {count} open PRs ({others} besides this one) but the limit is {limit}!"
    )]
    LimitExceeded {
        author: String,
        count: u64,
        others: u64,
        limit: u64,
    },
}
