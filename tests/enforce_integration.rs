use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::DateTime;
use prlimit::{
    Author, CountStrategy, Forge, LimitError, LimitSpec, PolicyConfig, PullRequestEvent,
    PullRequestRef, RemedialAction, Repo, enforce_limit,
};

/// Records every call so tests can assert the calling sequence.
#[derive(Default)]
pub struct MockForge {
    pub prs: Vec<PullRequestRef>,
    pub search_count: u64,
    pub fail_count: bool,
    pub fail_comment: bool,
    pub fail_close: bool,
    pub calls: Mutex<Vec<String>>,
}

impl MockForge {
    fn with_search_count(search_count: u64) -> Self {
        Self {
            search_count,
            ..Default::default()
        }
    }

    fn with_prs(prs: Vec<PullRequestRef>) -> Self {
        Self {
            prs,
            ..Default::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forge for MockForge {
    async fn list_open_pull_requests(&self, repo: &Repo) -> Result<Vec<PullRequestRef>> {
        self.record(format!("list {repo}"));
        if self.fail_count {
            anyhow::bail!("502 Bad Gateway");
        }
        Ok(self.prs.clone())
    }

    async fn search_open_count(&self, repo: &Repo, author: &Author) -> Result<u64> {
        self.record(format!("search {repo} {}", author.search_qualifier()));
        if self.fail_count {
            anyhow::bail!("API rate limit exceeded");
        }
        Ok(self.search_count)
    }

    async fn post_comment(&self, _repo: &Repo, pr: &PullRequestRef, body: &str) -> Result<()> {
        self.record(format!("comment #{} {}", pr.number, body));
        if self.fail_comment {
            anyhow::bail!("Resource not accessible by integration");
        }
        Ok(())
    }

    async fn close_pull_request(&self, _repo: &Repo, pr: &PullRequestRef) -> Result<()> {
        self.record(format!("close #{}", pr.number));
        if self.fail_close {
            anyhow::bail!("Resource not accessible by integration");
        }
        Ok(())
    }
}

fn test_repo() -> Repo {
    Repo::new("owner", "repo").unwrap()
}

fn pr(number: u64, login: &str, draft: bool, created: i64) -> PullRequestRef {
    PullRequestRef {
        number,
        node_id: format!("PR_node{number}"),
        author: Author::user(login),
        draft,
        created_at: DateTime::from_timestamp(created, 0).unwrap(),
    }
}

fn event_for(pull_request: PullRequestRef) -> PullRequestEvent {
    PullRequestEvent {
        repo: test_repo(),
        pull_request,
        head_ref: "feature".to_string(),
        base_ref: "main".to_string(),
    }
}

fn spec(strategy: CountStrategy, limit: u64, message: Option<&str>, auto_close: bool) -> LimitSpec {
    LimitSpec {
        policy: PolicyConfig {
            limit,
            message: message.map(str::to_string),
            auto_close,
            ..Default::default()
        },
        strategy,
        require_latest: strategy.requires_latest_by_default(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_search_over_limit_comments_then_closes() {
    let forge = MockForge::with_search_count(12);
    let event = event_for(pr(42, "alice", false, 100));
    let spec = spec(CountStrategy::Search, 10, Some("please close one"), true);

    let outcome = enforce_limit(&spec, &event, &forge).await.unwrap();

    assert!(outcome.decision.exceeded);
    assert!(outcome.action_failures.is_empty());
    assert_eq!(
        forge.calls(),
        vec![
            "search owner/repo alice".to_string(),
            "comment #42 @alice please close one".to_string(),
            "close #42".to_string(),
        ]
    );

    match outcome.limit_exceeded() {
        Some(
            err @ LimitError::LimitExceeded {
                count: 12,
                others: 11,
                limit: 10,
                ..
            },
        ) => {
            assert_eq!(
                err.to_string(),
                "PR author alice currently has 12 open PRs (11 besides this one) but the limit is 10!"
            );
        }
        other => panic!("expected LimitExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_search_count_including_current_is_within_limit() {
    let forge = MockForge::with_search_count(11);
    let event = event_for(pr(42, "alice", false, 100));
    let spec = spec(CountStrategy::Search, 10, Some("please close one"), true);

    let outcome = enforce_limit(&spec, &event, &forge).await.unwrap();

    assert!(!outcome.decision.exceeded);
    assert!(outcome.limit_exceeded().is_none());
    assert_eq!(forge.calls(), vec!["search owner/repo alice".to_string()]);
}

#[tokio::test]
async fn test_search_for_draft_counts_every_result() {
    // The search excludes drafts, so none of the 11 results is the current PR.
    let forge = MockForge::with_search_count(11);
    let event = event_for(pr(42, "alice", true, 100));
    let spec = spec(CountStrategy::Search, 10, None, false);

    let outcome = enforce_limit(&spec, &event, &forge).await.unwrap();

    assert!(outcome.decision.exceeded);
    assert_eq!(outcome.count.unwrap().others(), 11);
}

#[tokio::test]
async fn test_search_for_bot_author_uses_app_qualifier() {
    let forge = MockForge::with_search_count(0);
    let mut current = pr(42, "dependabot[bot]", false, 100);
    current.author = Author::bot("dependabot[bot]");
    let event = event_for(current);

    enforce_limit(&spec(CountStrategy::Search, 10, None, false), &event, &forge)
        .await
        .unwrap();

    assert_eq!(forge.calls(), vec!["search owner/repo app/dependabot".to_string()]);
}

#[tokio::test]
async fn test_list_strategy_counts_non_draft_pull_requests_of_author() {
    let prs = vec![
        pr(1, "alice", false, 1),
        pr(2, "alice", false, 2),
        pr(3, "alice", true, 3),
        pr(4, "bob", false, 4),
        pr(5, "alice", false, 5),
    ];
    let forge = MockForge::with_prs(prs.clone());
    let event = event_for(prs[4].clone());

    let outcome = enforce_limit(&spec(CountStrategy::List, 1, Some("too many"), false), &event, &forge)
        .await
        .unwrap();

    let count = outcome.count.unwrap();
    assert_eq!(count.total, 3);
    assert_eq!(count.others(), 2);
    assert!(outcome.decision.exceeded);
    assert_eq!(
        forge.calls(),
        vec![
            "list owner/repo".to_string(),
            "comment #5 @alice too many".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_list_strategy_skips_when_not_latest_pull_request() {
    let prs = vec![pr(1, "alice", false, 1), pr(2, "alice", false, 2), pr(3, "alice", false, 3)];
    let forge = MockForge::with_prs(prs.clone());
    let event = event_for(prs[0].clone());

    let outcome = enforce_limit(&spec(CountStrategy::List, 0, Some("x"), true), &event, &forge)
        .await
        .unwrap();

    assert!(outcome.skipped());
    assert!(!outcome.decision.exceeded);
    assert!(outcome.limit_exceeded().is_none());
    assert_eq!(forge.calls(), vec!["list owner/repo".to_string()]);
}

#[tokio::test]
async fn test_list_strategy_without_latest_check_evaluates_older_pull_request() {
    let prs = vec![pr(1, "alice", false, 1), pr(2, "alice", false, 2), pr(3, "alice", false, 3)];
    let forge = MockForge::with_prs(prs.clone());
    let event = event_for(prs[0].clone());
    let spec = LimitSpec {
        require_latest: false,
        ..spec(CountStrategy::List, 1, None, false)
    };

    let outcome = enforce_limit(&spec, &event, &forge).await.unwrap();

    assert!(!outcome.skipped());
    assert!(outcome.decision.exceeded);
}

#[tokio::test]
async fn test_search_with_latest_check_lists_then_searches() {
    let prs = vec![pr(1, "alice", false, 1), pr(2, "alice", false, 2)];
    let mut forge = MockForge::with_prs(prs.clone());
    forge.search_count = 2;
    let event = event_for(prs[1].clone());
    let spec = LimitSpec {
        require_latest: true,
        ..spec(CountStrategy::Search, 10, None, false)
    };

    let outcome = enforce_limit(&spec, &event, &forge).await.unwrap();

    assert!(!outcome.decision.exceeded);
    assert_eq!(
        forge.calls(),
        vec!["list owner/repo".to_string(), "search owner/repo alice".to_string()]
    );
}

#[tokio::test]
async fn test_count_failure_aborts_before_any_action() {
    let forge = MockForge {
        fail_count: true,
        ..MockForge::with_search_count(100)
    };
    let event = event_for(pr(42, "alice", false, 100));

    let result = enforce_limit(&spec(CountStrategy::Search, 1, Some("x"), true), &event, &forge).await;

    match result {
        Err(LimitError::CountRetrieval { author, repo, .. }) => {
            assert_eq!(author, "alice");
            assert_eq!(repo, "owner/repo");
        }
        other => panic!("expected CountRetrieval, got {other:?}"),
    }
    assert_eq!(forge.calls(), vec!["search owner/repo alice".to_string()]);
}

#[tokio::test]
async fn test_comment_failure_still_closes_and_keeps_violation() {
    let forge = MockForge {
        fail_comment: true,
        ..MockForge::with_search_count(20)
    };
    let event = event_for(pr(42, "alice", false, 100));

    let outcome = enforce_limit(&spec(CountStrategy::Search, 10, Some("x"), true), &event, &forge)
        .await
        .unwrap();

    assert_eq!(outcome.action_failures.len(), 1);
    assert!(matches!(
        outcome.action_failures[0],
        LimitError::ActionApplication {
            action: RemedialAction::Comment,
            number: 42,
            ..
        }
    ));
    assert!(forge.calls().contains(&"close #42".to_string()));
    assert!(outcome.limit_exceeded().is_some());
}

#[tokio::test]
async fn test_both_actions_failing_are_reported() {
    let forge = MockForge {
        fail_comment: true,
        fail_close: true,
        ..MockForge::with_search_count(20)
    };
    let event = event_for(pr(42, "alice", false, 100));

    let outcome = enforce_limit(&spec(CountStrategy::Search, 10, Some("x"), true), &event, &forge)
        .await
        .unwrap();

    let actions: Vec<RemedialAction> = outcome
        .action_failures
        .iter()
        .filter_map(|failure| match failure {
            LimitError::ActionApplication { action, .. } => Some(*action),
            _ => None,
        })
        .collect();
    assert_eq!(actions, vec![RemedialAction::Comment, RemedialAction::Close]);
    assert!(outcome.limit_exceeded().is_some());
}

#[tokio::test]
async fn test_no_message_and_no_auto_close_only_fails() {
    let forge = MockForge::with_search_count(20);
    let event = event_for(pr(42, "alice", false, 100));

    let outcome = enforce_limit(&spec(CountStrategy::Search, 10, None, false), &event, &forge)
        .await
        .unwrap();

    assert!(outcome.limit_exceeded().is_some());
    assert_eq!(forge.calls(), vec!["search owner/repo alice".to_string()]);
}

#[tokio::test]
async fn test_dry_run_reports_without_side_effects() {
    let forge = MockForge::with_search_count(20);
    let event = event_for(pr(42, "alice", false, 100));
    let spec = LimitSpec {
        dry_run: true,
        ..spec(CountStrategy::Search, 10, Some("x"), true)
    };

    let outcome = enforce_limit(&spec, &event, &forge).await.unwrap();

    assert!(outcome.decision.should_close);
    assert!(outcome.limit_exceeded().is_some());
    assert_eq!(forge.calls(), vec!["search owner/repo alice".to_string()]);
}
