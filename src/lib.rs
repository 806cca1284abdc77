//! prlimit: cap the number of concurrently open pull requests per author.
//!
//! Runs on a pull request event, counts the author's open, non-draft pull
//! requests (by listing or through the search API), decides whether the
//! configured limit is exceeded and, if so, comments on and optionally
//! closes the triggering pull request. The decision itself lives in
//! [`policy`] and performs no I/O.

pub mod cli;
pub mod enforce;
pub mod error;
pub mod event;
pub mod github;
pub mod graphql;
pub mod policy;
pub mod types;
pub mod workflow;

pub use cli::parse_args;
pub use enforce::{Outcome, enforce_limit};
pub use error::{LimitError, RemedialAction};
pub use event::{PULL_REQUEST_EVENTS, PullRequestEvent, ensure_pull_request_trigger};
pub use github::{Endpoints, GitHub, resolve_token, resolve_token_from};
pub use policy::{count_open_by_author, evaluate, is_latest_for_author};
pub use types::{
    Author, AuthorKind, AuthorOpenCount, Comparison, CountStrategy, DEFAULT_LIMIT, EventSource,
    Forge, LimitSpec, PolicyConfig, PolicyDecision, PullRequestRef, Repo, RepoError,
};
