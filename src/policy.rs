//! Concurrent pull request limit policy.
//!
//! Everything here is a pure function of its inputs: no network, no
//! logging, no mutation. Callers fetch counts and apply the resulting
//! decision themselves.

use crate::types::{Author, AuthorOpenCount, PolicyConfig, PolicyDecision, PullRequestRef};

/// Decides whether `author` has too many open pull requests.
///
/// The pull request under evaluation never counts against its own author:
/// when `count.includes_current` is set one is subtracted before applying
/// `config.comparison` against `config.limit`.
pub fn evaluate(count: AuthorOpenCount, config: &PolicyConfig, author: &str) -> PolicyDecision {
    let exceeded = config.comparison.holds(count.others(), config.limit);
    if !exceeded {
        return PolicyDecision::no_op();
    }

    let comment_body = config
        .message
        .as_deref()
        .filter(|message| !message.is_empty())
        .map(|message| format!("@{author} {message}"));

    PolicyDecision {
        exceeded,
        comment_body,
        should_close: config.auto_close,
    }
}

/// Counts the author's open, non-draft pull requests in a listing.
///
/// The returned count includes `current` when it appears in the listing as
/// a non-draft.
pub fn count_open_by_author(prs: &[PullRequestRef], current: &PullRequestRef) -> AuthorOpenCount {
    let authored: Vec<&PullRequestRef> = prs
        .iter()
        .filter(|pr| !pr.draft && pr.is_authored_by(&current.author))
        .collect();

    let includes_current = authored.iter().any(|pr| pr.number == current.number);
    AuthorOpenCount::new(authored.len() as u64, includes_current)
}

/// Reports whether `current` is the most recently created open, non-draft
/// pull request of its author in `prs`.
///
/// Creation time ties are broken by pull request number.
pub fn is_latest_for_author(prs: &[PullRequestRef], current: &PullRequestRef) -> bool {
    latest_for_author(prs, &current.author).is_none_or(|latest| {
        (latest.created_at, latest.number) <= (current.created_at, current.number)
    })
}

fn latest_for_author<'a>(prs: &'a [PullRequestRef], author: &Author) -> Option<&'a PullRequestRef> {
    prs.iter()
        .filter(|pr| !pr.draft && pr.is_authored_by(author))
        .max_by_key(|pr| (pr.created_at, pr.number))
}
