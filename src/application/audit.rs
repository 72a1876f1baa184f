use crate::domain::{
    assemble, normalize_members, ActivityEvent, FoldOutcome, Member, OrgReport, RepoActivity,
    Repository, Threshold,
};
use crate::infrastructure::FetchError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Where organization data comes from.
///
/// Implementations own pagination, pacing and retries; every call returns
/// a complete, already-merged listing.
#[allow(async_fn_in_trait)]
pub trait ActivitySource {
    /// Every member of the organization, including members with no activity
    async fn list_members(&self, org: &str) -> Result<Vec<Member>, FetchError>;

    /// Repositories of the organization, forks excluded
    async fn list_repositories(&self, org: &str) -> Result<Vec<Repository>, FetchError>;

    async fn list_branches(&self, repo: &Repository) -> Result<Vec<String>, FetchError>;

    /// Commits reachable from `branch`
    async fn commit_events(&self, repo: &Repository, branch: &str) -> Result<Vec<ActivityEvent>, FetchError>;

    async fn issue_events(&self, repo: &Repository) -> Result<Vec<ActivityEvent>, FetchError>;

    async fn pull_request_events(&self, repo: &Repository) -> Result<Vec<ActivityEvent>, FetchError>;
}

/// Hook for following an audit as it runs. All methods default to no-ops.
pub trait AuditObserver {
    fn organization_started(&mut self, _org: &str, _members: usize, _repositories: usize) {}

    fn repository_started(&mut self, _repo: &Repository, _index: usize, _total: usize) {}

    fn branch_started(&mut self, _repo: &Repository, _branch: &str) {}

    fn event_folded(&mut self, _repo: &Repository, _event: &ActivityEvent, _outcome: FoldOutcome) {}

    /// A stream could not be fetched and is treated as having no events
    fn stream_skipped(&mut self, _repo: &Repository, _stream: &str, _error: &FetchError) {}
}

/// Fetch, fold and assemble the activity report of one organization.
///
/// Members and repositories must be listed successfully. A failed branch,
/// commit, issue or pull request listing only empties that stream, unless
/// the failure is fatal (bad credentials).
pub async fn audit_organization<S, O>(
    source: &S,
    org: &str,
    threshold: Threshold,
    now: DateTime<Utc>,
    observer: &mut O,
) -> Result<OrgReport>
where
    S: ActivitySource,
    O: AuditObserver,
{
    let members = normalize_members(
        source
            .list_members(org)
            .await
            .with_context(|| format!("Failed to list members of {}", org))?,
    );
    let repos = source
        .list_repositories(org)
        .await
        .with_context(|| format!("Failed to list repositories of {}", org))?;

    observer.organization_started(org, members.len(), repos.len());

    let total = repos.len();
    let mut per_repo = Vec::with_capacity(total);
    for (index, repo) in repos.into_iter().enumerate() {
        observer.repository_started(&repo, index, total);
        let activity = audit_repository(source, &repo, &members, observer).await?;
        per_repo.push((repo, activity));
    }

    Ok(assemble(org, &members, &per_repo, threshold, now))
}

async fn audit_repository<S, O>(
    source: &S,
    repo: &Repository,
    members: &[Member],
    observer: &mut O,
) -> Result<RepoActivity>
where
    S: ActivitySource,
    O: AuditObserver,
{
    let mut activity = RepoActivity::new(members);

    let branches = or_skip(source.list_branches(repo).await, repo, "branches", observer)?;
    for branch in &branches {
        observer.branch_started(repo, branch);
        let commits = or_skip(
            source.commit_events(repo, branch).await,
            repo,
            "commits",
            observer,
        )?;
        fold_into(&mut activity, repo, &commits, observer);
    }

    let issues = or_skip(source.issue_events(repo).await, repo, "issues", observer)?;
    fold_into(&mut activity, repo, &issues, observer);

    let pulls = or_skip(
        source.pull_request_events(repo).await,
        repo,
        "pull requests",
        observer,
    )?;
    fold_into(&mut activity, repo, &pulls, observer);

    Ok(activity)
}

fn fold_into<O: AuditObserver>(
    activity: &mut RepoActivity,
    repo: &Repository,
    events: &[ActivityEvent],
    observer: &mut O,
) {
    for event in events {
        let outcome = activity.fold(event);
        observer.event_folded(repo, event, outcome);
    }
}

/// Turn a non-fatal fetch failure into an empty listing
fn or_skip<T: Default, O: AuditObserver>(
    result: Result<T, FetchError>,
    repo: &Repository,
    stream: &str,
    observer: &mut O,
) -> Result<T> {
    match result {
        Ok(items) => Ok(items),
        Err(err) if err.is_fatal() => {
            Err(err).with_context(|| format!("Failed to fetch {} of {}", stream, repo))
        }
        Err(err) => {
            observer.stream_skipped(repo, stream, &err);
            Ok(T::default())
        }
    }
}
