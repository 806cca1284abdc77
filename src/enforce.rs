use tracing::{debug, error, info, warn};

use crate::{
    error::{LimitError, RemedialAction},
    event::PullRequestEvent,
    policy::{count_open_by_author, evaluate, is_latest_for_author},
    types::{AuthorOpenCount, CountStrategy, Forge, LimitSpec, PolicyDecision},
};

/// Result of enforcing the limit on one pull request.
#[derive(Debug)]
pub struct Outcome {
    pub number: u64,
    pub author: String,
    pub limit: u64,
    /// `None` when the evaluation was skipped.
    pub count: Option<AuthorOpenCount>,
    pub decision: PolicyDecision,
    /// Comment or close calls that failed after a violation was found.
    pub action_failures: Vec<LimitError>,
}

impl Outcome {
    pub fn skipped(&self) -> bool {
        self.count.is_none()
    }

    /// The violation to report as the run's failure, if any.
    ///
    /// Independent of whether the remedial actions succeeded.
    pub fn limit_exceeded(&self) -> Option<LimitError> {
        let count = self.count?;
        self.decision.exceeded.then(|| LimitError::LimitExceeded {
            author: self.author.clone(),
            count: count.total,
            others: count.others(),
            limit: self.limit,
        })
    }
}

/// Counts the author's open pull requests, evaluates the policy and
/// applies the resulting comment and close actions.
///
/// Count retrieval failures abort the run. Action failures are collected in
/// the returned [`Outcome`] and never replace the violation itself.
pub async fn enforce_limit<F>(
    spec: &LimitSpec,
    event: &PullRequestEvent,
    forge: &F,
) -> Result<Outcome, LimitError>
where
    F: Forge + Sync,
{
    let current = &event.pull_request;
    let author = &current.author;

    info!(
        "Checking pull request #{}: {} -> {}",
        current.number, event.head_ref, event.base_ref
    );

    let count_error = |source| LimitError::CountRetrieval {
        author: author.login.clone(),
        repo: event.repo.to_string(),
        source,
    };

    let mut outcome = Outcome {
        number: current.number,
        author: author.login.clone(),
        limit: spec.policy.limit,
        count: None,
        decision: PolicyDecision::no_op(),
        action_failures: Vec::new(),
    };

    let listing = if spec.strategy == CountStrategy::List || spec.require_latest {
        forge
            .list_open_pull_requests(&event.repo)
            .await
            .map_err(count_error)?
    } else {
        Vec::new()
    };

    if spec.require_latest && !is_latest_for_author(&listing, current) {
        info!("This is not the latest PR of {author}.");
        return Ok(outcome);
    }

    let count = match spec.strategy {
        CountStrategy::List => count_open_by_author(&listing, current),
        CountStrategy::Search => {
            let total = forge
                .search_open_count(&event.repo, author)
                .await
                .map_err(count_error)?;
            // The search excludes drafts, so a draft never counts itself.
            AuthorOpenCount::new(total, !current.draft)
        }
    };

    info!(
        "PR author {author} currently has {} open PRs.",
        count.total
    );
    debug!(
        strategy = spec.strategy.as_str(),
        comparison = spec.policy.comparison.as_str(),
        others = count.others(),
        limit = spec.policy.limit,
        "evaluating pull request limit"
    );

    let decision = evaluate(count, &spec.policy, &author.login);
    outcome.count = Some(count);

    if !decision.exceeded {
        info!("PR author {author} is within the limit of {}.", spec.policy.limit);
        return Ok(outcome);
    }

    warn!(
        "PR author {author} currently has {} open PRs but the limit is {}!",
        count.total, spec.policy.limit
    );

    if spec.dry_run {
        info!("Dry run: not commenting on or closing pull request #{}", current.number);
        outcome.decision = decision;
        return Ok(outcome);
    }

    if let Some(body) = &decision.comment_body {
        match forge.post_comment(&event.repo, current, body).await {
            Ok(()) => info!("Commented on pull request #{}", current.number),
            Err(source) => {
                error!("Failed to comment on pull request #{}: {source:#}", current.number);
                outcome.action_failures.push(LimitError::ActionApplication {
                    action: RemedialAction::Comment,
                    number: current.number,
                    source,
                });
            }
        }
    }

    if decision.should_close {
        match forge.close_pull_request(&event.repo, current).await {
            Ok(()) => info!("Closed pull request #{}", current.number),
            Err(source) => {
                error!("Failed to close pull request #{}: {source:#}", current.number);
                outcome.action_failures.push(LimitError::ActionApplication {
                    action: RemedialAction::Close,
                    number: current.number,
                    source,
                });
            }
        }
    }

    outcome.decision = decision;
    Ok(outcome)
}
