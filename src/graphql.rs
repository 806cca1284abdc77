use std::time::Duration;

use anyhow::{Context, Result};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::types::{Author, Repo};

/// Aggregate count of open pull requests matching `$searchQuery`.
pub const OPEN_COUNT_QUERY: &str = r#"
    query($searchQuery: String!) {
        search(query: $searchQuery, type: ISSUE) {
            issueCount
        }
    }
"#;

pub const ADD_COMMENT_MUTATION: &str = r#"
    mutation($subjectId: ID!, $body: String!) {
        addComment(input: { subjectId: $subjectId, body: $body }) {
            clientMutationId
        }
    }
"#;

pub const CLOSE_PULL_REQUEST_MUTATION: &str = r#"
    mutation($pullRequestId: ID!) {
        closePullRequest(input: { pullRequestId: $pullRequestId }) {
            pullRequest {
                number
                state
            }
        }
    }
"#;

#[derive(Debug, Default)]
pub struct SearchQueryBuilder {
    terms: Vec<String>,
}

impl SearchQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo(&mut self, repo: &Repo) -> &mut Self {
        self.terms.push(format!("repo:{repo}"));
        self
    }

    pub fn author(&mut self, author: &Author) -> &mut Self {
        self.terms.push(format!("author:{}", author.search_qualifier()));
        self
    }

    pub fn qualifier(&mut self, qualifier: &str) -> &mut Self {
        self.terms.push(qualifier.to_string());
        self
    }

    pub fn build(&self) -> String {
        self.terms.join(" ")
    }
}

/// Search string selecting the author's open, non-draft pull requests in
/// an unarchived repository.
pub fn open_pull_requests_search(repo: &Repo, author: &Author) -> String {
    SearchQueryBuilder::new()
        .repo(repo)
        .author(author)
        .qualifier("is:open")
        .qualifier("is:pr")
        .qualifier("draft:false")
        .qualifier("archived:false")
        .build()
}

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchCountData {
    pub search: SearchCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCount {
    pub issue_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentData {
    pub add_comment: Option<AddCommentPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentPayload {
    pub client_mutation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePullRequestData {
    pub close_pull_request: Option<ClosePullRequestPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePullRequestPayload {
    pub pull_request: Option<ClosedPullRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ClosedPullRequest {
    pub number: u64,
    pub state: String,
}

/// GraphQL client.
///
/// Queries are retried on transient failures. Mutations are sent exactly
/// once, since a timeout or 5xx may arrive after GitHub has applied them.
/// Documents are sent unchanged; every dynamic value travels in the
/// `variables` object.
pub struct GraphQLClient {
    retrying: ClientWithMiddleware,
    single_shot: ClientWithMiddleware,
    endpoint: Url,
    token: String,
}

impl GraphQLClient {
    pub fn new(endpoint: Url, token: impl Into<String>) -> Result<Self> {
        let base_client = reqwest::Client::builder()
            .user_agent(concat!("prlimit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(250), Duration::from_secs(5))
            .build_with_max_retries(3);

        let retrying = ClientBuilder::new(base_client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        let single_shot = ClientBuilder::new(base_client).build();

        Ok(Self {
            retrying,
            single_shot,
            endpoint,
            token: token.into(),
        })
    }

    /// Runs a read-only query, retrying transient failures.
    pub async fn query<T>(&self, document: &str, variables: serde_json::Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(&self.retrying, document, variables).await
    }

    /// Runs a mutation with a single attempt.
    pub async fn mutate<T>(&self, document: &str, variables: serde_json::Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(&self.single_shot, document, variables).await
    }

    async fn send<T>(
        &self,
        client: &ClientWithMiddleware,
        document: &str,
        variables: serde_json::Value,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let payload = json!({
            "query": document,
            "variables": variables,
        });

        debug!(endpoint = %self.endpoint, "sending GraphQL request");
        let response = client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("GraphQL request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GraphQL request failed with status {status}: {body}");
        }

        let response: GraphQLResponse<T> = response
            .json()
            .await
            .context("Failed to decode GraphQL response")?;

        if !response.errors.is_empty() {
            let messages: Vec<&str> = response
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect();
            anyhow::bail!("GraphQL errors: {}", messages.join("; "));
        }

        response
            .data
            .context("GraphQL response contained neither data nor errors")
    }
}
