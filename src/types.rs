use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Default number of concurrently open pull requests an author may have.
pub const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    InvalidFormat(String),
    EmptyComponent(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::InvalidFormat(s) => {
                write!(f, "repository must be in format 'owner/repo', got: '{s}'")
            }
            RepoError::EmptyComponent(s) => {
                write!(f, "repository owner and name must be non-empty, got: '{s}'")
            }
        }
    }
}

impl std::error::Error for RepoError {}

/// Repository coordinates on the forge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.trim().is_empty() || name.trim().is_empty() {
            return Err(RepoError::EmptyComponent(format!("{owner}/{name}")));
        }
        Ok(Self { owner, name })
    }

    pub fn parse(s: &str) -> Result<Self, RepoError> {
        let mut parts = s.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => Self::new(owner, name),
            _ => Err(RepoError::InvalidFormat(s.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for Repo {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Categorises pull request authors; bots are searched differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorKind {
    #[default]
    User,
    Bot,
}

impl AuthorKind {
    pub fn from_typename(typename: &str) -> Self {
        match typename {
            "Bot" => AuthorKind::Bot,
            _ => AuthorKind::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub login: String,
    pub kind: AuthorKind,
}

impl Author {
    pub fn user(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            kind: AuthorKind::User,
        }
    }

    pub fn bot(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            kind: AuthorKind::Bot,
        }
    }

    /// Returns the value for an `author:` search qualifier.
    ///
    /// GitHub search does not accept `name[bot]` logins; apps are matched
    /// as `app/name` instead.
    pub fn search_qualifier(&self) -> String {
        match self.kind {
            AuthorKind::Bot => {
                let name = self.login.strip_suffix("[bot]").unwrap_or(&self.login);
                format!("app/{name}")
            }
            AuthorKind::User => self.login.clone(),
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.login)
    }
}

/// Immutable snapshot of a pull request taken for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    /// Number used by REST calls.
    pub number: u64,
    /// Opaque node id targeted by GraphQL mutations.
    pub node_id: String,
    pub author: Author,
    pub draft: bool,
    pub created_at: DateTime<Utc>,
}

impl PullRequestRef {
    pub fn is_authored_by(&self, author: &Author) -> bool {
        self.author.login == author.login
    }
}

/// How many open, non-draft pull requests an author has.
///
/// `includes_current` records whether `total` already counts the pull
/// request being evaluated, so the policy can exclude it from its own count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorOpenCount {
    pub total: u64,
    pub includes_current: bool,
}

impl AuthorOpenCount {
    pub fn new(total: u64, includes_current: bool) -> Self {
        Self {
            total,
            includes_current,
        }
    }

    /// Open pull requests by the author other than the one under evaluation.
    pub fn others(&self) -> u64 {
        if self.includes_current {
            self.total.saturating_sub(1)
        } else {
            self.total
        }
    }
}

/// Threshold comparison applied between the author's other open pull
/// requests and the configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    /// `others > limit`
    #[default]
    Greater,
    /// `others >= limit`
    GreaterOrEqual,
}

impl Comparison {
    pub fn holds(&self, count: u64, limit: u64) -> bool {
        match self {
            Comparison::Greater => count > limit,
            Comparison::GreaterOrEqual => count >= limit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Greater => "gt",
            Comparison::GreaterOrEqual => "ge",
        }
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gt" | ">" => Ok(Comparison::Greater),
            "ge" | ">=" => Ok(Comparison::GreaterOrEqual),
            other => Err(format!("unknown comparison '{other}', expected 'gt' or 'ge'")),
        }
    }
}

/// Where the author's open pull request count comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountStrategy {
    /// List the repository's open pull requests and filter by author.
    List,
    /// Ask the search API for an aggregate issue count.
    #[default]
    Search,
}

impl CountStrategy {
    /// Whether the latest-PR check runs when not configured explicitly.
    pub fn requires_latest_by_default(&self) -> bool {
        matches!(self, CountStrategy::List)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CountStrategy::List => "list",
            CountStrategy::Search => "search",
        }
    }
}

impl FromStr for CountStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "list" => Ok(CountStrategy::List),
            "search" => Ok(CountStrategy::Search),
            other => Err(format!(
                "unknown count strategy '{other}', expected 'list' or 'search'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub limit: u64,
    pub message: Option<String>,
    pub auto_close: bool,
    pub comparison: Comparison,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            message: None,
            auto_close: false,
            comparison: Comparison::default(),
        }
    }
}

/// Outcome of evaluating one pull request against the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDecision {
    pub exceeded: bool,
    pub comment_body: Option<String>,
    pub should_close: bool,
}

impl PolicyDecision {
    /// Decision for an evaluation that was skipped.
    pub fn no_op() -> Self {
        Self::default()
    }
}

/// Where the triggering workflow event is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSource {
    pub name: Option<String>,
    pub path: Option<std::path::PathBuf>,
}

/// Everything one invocation needs, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitSpec {
    pub repo: Option<Repo>,
    pub event: EventSource,
    pub policy: PolicyConfig,
    pub strategy: CountStrategy,
    pub require_latest: bool,
    pub dry_run: bool,
}

impl Default for LimitSpec {
    fn default() -> Self {
        let strategy = CountStrategy::default();
        Self {
            repo: None,
            event: EventSource::default(),
            policy: PolicyConfig::default(),
            strategy,
            require_latest: strategy.requires_latest_by_default(),
            dry_run: false,
        }
    }
}

/// Capabilities the limit enforcement needs from a code-hosting platform.
///
/// Implementations do the I/O; failures are reported as errors and never
/// swallowed.
#[async_trait]
pub trait Forge {
    /// All open pull requests in the repository, drafts included.
    async fn list_open_pull_requests(&self, repo: &Repo) -> anyhow::Result<Vec<PullRequestRef>>;

    /// Aggregate count of the author's open, non-draft pull requests.
    async fn search_open_count(&self, repo: &Repo, author: &Author) -> anyhow::Result<u64>;

    async fn post_comment(
        &self,
        repo: &Repo,
        pull_request: &PullRequestRef,
        body: &str,
    ) -> anyhow::Result<()>;

    async fn close_pull_request(
        &self,
        repo: &Repo,
        pull_request: &PullRequestRef,
    ) -> anyhow::Result<()>;
}
