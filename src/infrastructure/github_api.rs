use crate::application::ActivitySource;
use crate::domain::{ActivityEvent, Member, Repository};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

const MEMBERS_QUERY: &str = r#"
query($org: String!, $cursor: String) {
  organization(login: $org) {
    membersWithRole(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes { login }
    }
  }
}"#;

const REPOSITORIES_QUERY: &str = r#"
query($org: String!, $cursor: String) {
  organization(login: $org) {
    repositories(first: 100, isFork: false, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes { name }
    }
  }
}"#;

const BRANCHES_QUERY: &str = r#"
query($owner: String!, $repo: String!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    refs(refPrefix: "refs/heads/", first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes { name }
    }
  }
}"#;

const COMMITS_QUERY: &str = r#"
query($owner: String!, $repo: String!, $branch: String!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    ref(qualifiedName: $branch) {
      target {
        ... on Commit {
          history(first: 100, after: $cursor) {
            pageInfo { hasNextPage endCursor }
            nodes {
              oid
              committedDate
              author { user { login } }
            }
          }
        }
      }
    }
  }
}"#;

const ISSUES_QUERY: &str = r#"
query($owner: String!, $repo: String!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    issues(first: 100, after: $cursor, orderBy: {field: CREATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes { createdAt author { login } }
    }
  }
}"#;

const PULL_REQUESTS_QUERY: &str = r#"
query($owner: String!, $repo: String!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    pullRequests(first: 100, after: $cursor, orderBy: {field: CREATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes { createdAt author { login } }
    }
  }
}"#;

/// Errors talking to the GitHub GraphQL API
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("rate limited by GitHub: {0}")]
    RateLimited(String),

    #[error("GitHub returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("GraphQL query failed: {0}")]
    GraphQl(String),

    #[error("{0} not found or not accessible")]
    NotFound(String),

    #[error("unexpected response shape: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Transport(octocrab::Error),
}

impl FetchError {
    /// Errors that must stop the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Unauthorized(_))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited(_) | FetchError::Timeout(_) | FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 408,
            FetchError::Unauthorized(_)
            | FetchError::GraphQl(_)
            | FetchError::NotFound(_)
            | FetchError::Decode(_) => false,
        }
    }

    fn from_graphql_errors(errors: &[GraphQlError]) -> Self {
        if let Some(limited) = errors
            .iter()
            .find(|e| e.kind.as_deref() == Some("RATE_LIMITED"))
        {
            return FetchError::RateLimited(limited.message.clone());
        }

        if errors.is_empty() {
            return FetchError::GraphQl("response contained no data".to_string());
        }

        FetchError::GraphQl(
            errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

impl From<octocrab::Error> for FetchError {
    fn from(err: octocrab::Error) -> Self {
        if let octocrab::Error::GitHub { source, .. } = &err {
            let message = source.message.clone();
            return match source.status_code.as_u16() {
                401 => FetchError::Unauthorized(message),
                403 | 429 => FetchError::RateLimited(message),
                status => FetchError::Status { status, message },
            };
        }
        FetchError::Transport(err)
    }
}

/// Request pacing, timeout and retry settings for the GitHub client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Pause between two pages of the same listing
    pub page_delay: Duration,
    pub request_timeout: Duration,
    /// Attempts per request, including the first one
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Wait after GitHub reports a rate limit
    pub rate_limit_wait: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
            rate_limit_wait: Duration::from_secs(60),
        }
    }
}

impl PacingPolicy {
    /// How long to wait before retrying after `attempt` failed with `err`
    pub fn backoff(&self, err: &FetchError, attempt: u32) -> Duration {
        match err {
            FetchError::RateLimited(_) => self.rate_limit_wait,
            // 5s, 10s, 20s, ...
            FetchError::Timeout(_) | FetchError::Transport(_) => self
                .backoff_base
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1))),
            _ => self.backoff_base.saturating_mul(attempt),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

impl PageInfo {
    fn next_cursor(self) -> Option<String> {
        if self.has_next_page {
            self.end_cursor
        } else {
            None
        }
    }
}

/// A page of a GraphQL connection
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<N> {
    page_info: PageInfo,
    nodes: Vec<Option<N>>,
}

#[derive(Debug, Deserialize)]
struct OrganizationData<C> {
    organization: Option<C>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<C> {
    repository: Option<C>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembersWithRole {
    members_with_role: Connection<Actor>,
}

#[derive(Debug, Deserialize)]
struct Repositories {
    repositories: Connection<Named>,
}

#[derive(Debug, Deserialize)]
struct Refs {
    refs: Option<Connection<Named>>,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    git_ref: Option<RefTarget>,
}

#[derive(Debug, Deserialize)]
struct RefTarget {
    target: Option<CommitTarget>,
}

/// Missing `history` means the ref does not point at a commit
#[derive(Debug, Deserialize)]
struct CommitTarget {
    history: Option<Connection<CommitNode>>,
}

#[derive(Debug, Deserialize)]
struct Issues {
    issues: Connection<AuthoredNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequests {
    pull_requests: Connection<AuthoredNode>,
}

#[derive(Debug, Deserialize)]
struct Actor {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitNode {
    oid: String,
    committed_date: Option<DateTime<Utc>>,
    author: Option<GitActor>,
}

/// Git author; `user` is null when the email is not linked to an account
#[derive(Debug, Deserialize)]
struct GitActor {
    user: Option<Actor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthoredNode {
    created_at: Option<DateTime<Utc>>,
    author: Option<Actor>,
}

impl From<CommitNode> for ActivityEvent {
    fn from(node: CommitNode) -> Self {
        let author = node.author.and_then(|a| a.user).map(|u| u.login);
        ActivityEvent::commit(node.oid, author.as_deref(), node.committed_date)
    }
}

/// GitHub GraphQL client for fetching organization activity
pub struct GitHubClient {
    client: Octocrab,
    pacing: PacingPolicy,
}

impl GitHubClient {
    /// Create a new GitHub client with the given token
    pub fn new(token: String, pacing: PacingPolicy) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self { client, pacing })
    }

    #[cfg(test)]
    fn with_base_uri(token: String, base_uri: &str, pacing: PacingPolicy) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token)
            .base_uri(base_uri)
            .context("Invalid GitHub base URI")?
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self { client, pacing })
    }

    /// Run a query, retrying transient failures per the pacing policy
    async fn query<D: DeserializeOwned>(&self, query: &str, variables: &Value) -> Result<D, FetchError> {
        let payload = json!({ "query": query, "variables": variables });
        let mut attempt = 1;

        loop {
            match self.send::<D>(&payload).await {
                Ok(data) => return Ok(data),
                Err(err) if err.is_retryable() && attempt < self.pacing.max_attempts => {
                    let wait = self.pacing.backoff(&err, attempt);
                    warn!(
                        attempt,
                        max_attempts = self.pacing.max_attempts,
                        wait_secs = wait.as_secs(),
                        "{err}, retrying"
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send<D: DeserializeOwned>(&self, payload: &Value) -> Result<D, FetchError> {
        // `data` stays raw JSON until the errors are looked at
        let request = self.client.graphql::<GraphQlResponse<Value>>(payload);
        let response = timeout(self.pacing.request_timeout, request)
            .await
            .map_err(|_| FetchError::Timeout(self.pacing.request_timeout))??;

        match response.data {
            Some(data) => {
                for error in &response.errors {
                    debug!(message = %error.message, "partial GraphQL error");
                }
                serde_json::from_value(data).map_err(FetchError::Decode)
            }
            None => Err(FetchError::from_graphql_errors(&response.errors)),
        }
    }

    /// Follow a connection's cursor until the last page.
    ///
    /// `select` picks the connection out of the response; `None` means the
    /// object it hangs off (organization, repository, ref) does not exist.
    async fn paginate<D, N>(
        &self,
        query: &str,
        mut variables: Value,
        what: &str,
        select: impl Fn(D) -> Option<Connection<N>>,
    ) -> Result<Vec<N>, FetchError>
    where
        D: DeserializeOwned,
    {
        let mut nodes = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            variables["cursor"] = json!(cursor);
            let data: D = self.query(query, &variables).await?;
            let page = select(data).ok_or_else(|| FetchError::NotFound(what.to_string()))?;
            nodes.extend(page.nodes.into_iter().flatten());

            match page.page_info.next_cursor() {
                Some(next) => {
                    cursor = Some(next);
                    sleep(self.pacing.page_delay).await;
                }
                None => break,
            }
        }

        Ok(nodes)
    }
}

impl ActivitySource for GitHubClient {
    async fn list_members(&self, org: &str) -> Result<Vec<Member>, FetchError> {
        let actors = self
            .paginate(
                MEMBERS_QUERY,
                json!({ "org": org }),
                &format!("organization {}", org),
                |data: OrganizationData<MembersWithRole>| {
                    data.organization.map(|o| o.members_with_role)
                },
            )
            .await?;

        Ok(actors.into_iter().map(|a| Member::new(a.login)).collect())
    }

    async fn list_repositories(&self, org: &str) -> Result<Vec<Repository>, FetchError> {
        let repos = self
            .paginate(
                REPOSITORIES_QUERY,
                json!({ "org": org }),
                &format!("organization {}", org),
                |data: OrganizationData<Repositories>| data.organization.map(|o| o.repositories),
            )
            .await?;

        Ok(repos
            .into_iter()
            .map(|r| Repository::new(org, r.name))
            .collect())
    }

    async fn list_branches(&self, repo: &Repository) -> Result<Vec<String>, FetchError> {
        let refs = self
            .paginate(
                BRANCHES_QUERY,
                json!({ "owner": repo.owner, "repo": repo.name }),
                &format!("repository {}", repo),
                |data: RepositoryData<Refs>| data.repository.and_then(|r| r.refs),
            )
            .await?;

        Ok(refs.into_iter().map(|r| r.name).collect())
    }

    async fn commit_events(&self, repo: &Repository, branch: &str) -> Result<Vec<ActivityEvent>, FetchError> {
        let commits = self
            .paginate(
                COMMITS_QUERY,
                json!({
                    "owner": repo.owner,
                    "repo": repo.name,
                    "branch": format!("refs/heads/{}", branch),
                }),
                &format!("branch {} of {}", branch, repo),
                |data: RepositoryData<BranchRef>| data.repository?.git_ref?.target?.history,
            )
            .await?;

        Ok(commits.into_iter().map(ActivityEvent::from).collect())
    }

    async fn issue_events(&self, repo: &Repository) -> Result<Vec<ActivityEvent>, FetchError> {
        let issues = self
            .paginate(
                ISSUES_QUERY,
                json!({ "owner": repo.owner, "repo": repo.name }),
                &format!("repository {}", repo),
                |data: RepositoryData<Issues>| data.repository.map(|r| r.issues),
            )
            .await?;

        Ok(issues
            .into_iter()
            .map(|n| ActivityEvent::issue(n.author.as_ref().map(|a| a.login.as_str()), n.created_at))
            .collect())
    }

    async fn pull_request_events(&self, repo: &Repository) -> Result<Vec<ActivityEvent>, FetchError> {
        let pulls = self
            .paginate(
                PULL_REQUESTS_QUERY,
                json!({ "owner": repo.owner, "repo": repo.name }),
                &format!("repository {}", repo),
                |data: RepositoryData<PullRequests>| data.repository.map(|r| r.pull_requests),
            )
            .await?;

        Ok(pulls
            .into_iter()
            .map(|n| {
                ActivityEvent::pull_request(n.author.as_ref().map(|a| a.login.as_str()), n.created_at)
            })
            .collect())
    }
}
