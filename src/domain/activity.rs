use super::repo::Member;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// What kind of contribution an event represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
    /// A commit, identified by its SHA
    Commit { sha: String },
    Issue,
    PullRequest,
}

/// A single contribution as reported by GitHub.
///
/// Author and timestamp are optional because the API can return them as
/// null (deleted accounts, commits authored by unlinked emails, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub author: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ActivityEvent {
    pub fn commit(sha: impl Into<String>, author: Option<&str>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: ActivityKind::Commit { sha: sha.into() },
            author: author.map(str::to_string),
            timestamp,
        }
    }

    pub fn issue(author: Option<&str>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: ActivityKind::Issue,
            author: author.map(str::to_string),
            timestamp,
        }
    }

    pub fn pull_request(author: Option<&str>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: ActivityKind::PullRequest,
            author: author.map(str::to_string),
            timestamp,
        }
    }
}

/// Activity of one user in one repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityRecord {
    pub commits: u64,
    pub issues: u64,
    pub pull_requests: u64,
    /// Latest timestamp folded so far; `None` until something is counted
    pub last_activity: Option<DateTime<Utc>>,
}

impl ActivityRecord {
    /// Count one contribution of `kind` made at `at`.
    ///
    /// Commit de-duplication is not handled here, see [`RepoActivity::fold`].
    pub fn fold(self, kind: &ActivityKind, at: DateTime<Utc>) -> Self {
        let mut next = self;
        match kind {
            ActivityKind::Commit { .. } => next.commits += 1,
            ActivityKind::Issue => next.issues += 1,
            ActivityKind::PullRequest => next.pull_requests += 1,
        }
        next.last_activity = Some(match self.last_activity {
            Some(prev) => prev.max(at),
            None => at,
        });
        next
    }
}

/// Why an event did or did not change a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Counted,
    /// Commit SHA already seen in this repository (reachable from another branch)
    DuplicateCommit,
    NoAuthor,
    NoTimestamp,
    /// Author is not an organization member (outside collaborator, bot, ...)
    NotMember,
}

/// Per-repository record store.
///
/// Created with one zeroed record per member; only members are ever tracked.
#[derive(Debug, Clone, Default)]
pub struct RepoActivity {
    records: HashMap<String, ActivityRecord>,
    seen_commits: HashSet<String>,
}

impl RepoActivity {
    pub fn new(members: &[Member]) -> Self {
        let records = members
            .iter()
            .map(|m| (m.login.clone(), ActivityRecord::default()))
            .collect();

        Self {
            records,
            seen_commits: HashSet::new(),
        }
    }

    /// Fold one event into the store.
    ///
    /// A commit SHA is only considered the first time it shows up in this
    /// repository, whichever branch it came from. Its first-seen timestamp
    /// is the one that counts.
    pub fn fold(&mut self, event: &ActivityEvent) -> FoldOutcome {
        if let ActivityKind::Commit { sha } = &event.kind {
            if !self.seen_commits.insert(sha.clone()) {
                return FoldOutcome::DuplicateCommit;
            }
        }

        let Some(author) = event.author.as_deref() else {
            return FoldOutcome::NoAuthor;
        };
        let Some(at) = event.timestamp else {
            return FoldOutcome::NoTimestamp;
        };
        let Some(record) = self.records.get_mut(author) else {
            return FoldOutcome::NotMember;
        };

        *record = record.fold(&event.kind, at);
        FoldOutcome::Counted
    }

    /// Record for `login`, zeroed when the member has no activity.
    pub fn record(&self, login: &str) -> ActivityRecord {
        self.records.get(login).copied().unwrap_or_default()
    }
}
