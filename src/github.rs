use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::{Octocrab, params};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::{
    error::LimitError,
    graphql::{
        ADD_COMMENT_MUTATION, AddCommentData, CLOSE_PULL_REQUEST_MUTATION, ClosePullRequestData,
        GraphQLClient, OPEN_COUNT_QUERY, SearchCountData, open_pull_requests_search,
    },
    types::{Author, AuthorKind, Forge, PullRequestRef, Repo},
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Login GitHub reports for pull requests whose author account is gone.
const GHOST_LOGIN: &str = "ghost";

/// Picks the API token: the explicit input first, then `GITHUB_TOKEN`,
/// then `GH_TOKEN`.
pub fn resolve_token(explicit: Option<&str>) -> Result<String, LimitError> {
    resolve_token_from(
        explicit,
        std::env::var("GITHUB_TOKEN").ok().as_deref(),
        std::env::var("GH_TOKEN").ok().as_deref(),
    )
}

/// Takes the first non-blank token in order of precedence.
pub fn resolve_token_from(
    explicit: Option<&str>,
    github_token: Option<&str>,
    gh_token: Option<&str>,
) -> Result<String, LimitError> {
    [explicit, github_token, gh_token]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(LimitError::MissingRequiredConfig { name: "token" })
}

/// REST and GraphQL base URLs.
///
/// These differ in layout on GitHub Enterprise Server, so both are read
/// separately rather than derived from one another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api: Url,
    pub graphql: Url,
}

impl Endpoints {
    /// Reads `GITHUB_API_URL` and `GITHUB_GRAPHQL_URL` as set by Actions runners.
    pub fn from_env() -> Result<Self> {
        Self::from_values(
            std::env::var("GITHUB_API_URL").ok().as_deref(),
            std::env::var("GITHUB_GRAPHQL_URL").ok().as_deref(),
        )
    }

    pub fn from_values(api: Option<&str>, graphql: Option<&str>) -> Result<Self> {
        let parse = |value: Option<&str>, default: &str| -> Result<Url> {
            let value = value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default);
            Url::parse(value).with_context(|| format!("Invalid API URL: '{}'", value))
        };

        Ok(Self {
            api: parse(api, DEFAULT_API_URL)?,
            graphql: parse(graphql, DEFAULT_GRAPHQL_URL)?,
        })
    }
}

/// GitHub implementation of [`Forge`].
pub struct GitHub {
    octocrab: Octocrab,
    graphql: GraphQLClient,
}

impl GitHub {
    pub fn new(token: String, endpoints: &Endpoints) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .base_uri(endpoints.api.as_str())
            .context("Invalid GitHub API URL")?
            .personal_token(token.clone())
            .build()
            .context("Failed to create GitHub client")?;
        let graphql = GraphQLClient::new(endpoints.graphql.clone(), token)?;

        Ok(Self { octocrab, graphql })
    }
}

fn convert_pull_request(pr: octocrab::models::pulls::PullRequest) -> Result<PullRequestRef> {
    let author = pr.user.map_or_else(
        || Author::user(GHOST_LOGIN),
        |user| Author {
            kind: AuthorKind::from_typename(&user.r#type),
            login: user.login,
        },
    );

    Ok(PullRequestRef {
        number: pr.number,
        node_id: pr.node_id.unwrap_or_default(),
        author,
        draft: pr.draft.unwrap_or(false),
        created_at: pr
            .created_at
            .with_context(|| format!("Pull request #{} has no creation time", pr.number))?,
    })
}

#[async_trait]
impl Forge for GitHub {
    async fn list_open_pull_requests(&self, repo: &Repo) -> Result<Vec<PullRequestRef>> {
        let first_page = self
            .octocrab
            .pulls(repo.owner(), repo.name())
            .list()
            .state(params::State::Open)
            .sort(params::pulls::Sort::Created)
            .direction(params::Direction::Descending)
            .per_page(100)
            .send()
            .await
            .with_context(|| format!("Failed to list open pull requests in {}", repo))?;

        let prs = self
            .octocrab
            .all_pages(first_page)
            .await
            .with_context(|| format!("Failed to page through pull requests in {}", repo))?;
        debug!(repo = %repo, count = prs.len(), "listed open pull requests");

        prs.into_iter().map(convert_pull_request).collect()
    }

    async fn search_open_count(&self, repo: &Repo, author: &Author) -> Result<u64> {
        let search_query = open_pull_requests_search(repo, author);
        debug!(query = %search_query, "searching open pull requests");

        let data: SearchCountData = self
            .graphql
            .query(OPEN_COUNT_QUERY, json!({ "searchQuery": search_query }))
            .await?;

        Ok(data.search.issue_count)
    }

    async fn post_comment(
        &self,
        _repo: &Repo,
        pull_request: &PullRequestRef,
        body: &str,
    ) -> Result<()> {
        let data: AddCommentData = self
            .graphql
            .mutate(
                ADD_COMMENT_MUTATION,
                json!({ "subjectId": pull_request.node_id, "body": body }),
            )
            .await?;

        data.add_comment
            .context("addComment returned no payload")
            .map(|_| ())
    }

    async fn close_pull_request(&self, _repo: &Repo, pull_request: &PullRequestRef) -> Result<()> {
        let data: ClosePullRequestData = self
            .graphql
            .mutate(
                CLOSE_PULL_REQUEST_MUTATION,
                json!({ "pullRequestId": pull_request.node_id }),
            )
            .await?;

        let closed = data
            .close_pull_request
            .and_then(|payload| payload.pull_request)
            .context("closePullRequest returned no pull request")?;
        debug!(number = closed.number, state = %closed.state, "closed pull request");

        Ok(())
    }
}
