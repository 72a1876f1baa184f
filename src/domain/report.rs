use super::activity::RepoActivity;
use super::classify::{classify, last_activity_display, Status, Threshold};
use super::repo::{Member, Repository};
use chrono::{DateTime, Utc};

/// One member's line in a repository report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub username: String,
    pub commits: u64,
    pub issues: u64,
    pub pull_requests: u64,
    /// ISO-8601 timestamp or "N/A"
    pub last_activity: String,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReport {
    pub repository: String,
    pub rows: Vec<ReportRow>,
}

/// Everything reported for one organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgReport {
    pub organization: String,
    pub generated_at: DateTime<Utc>,
    pub threshold_days: u32,
    pub member_count: usize,
    pub repositories: Vec<RepoReport>,
}

impl OrgReport {
    /// Distinct members that are active in at least one repository
    pub fn active_members(&self) -> usize {
        let mut active: Vec<&str> = self
            .repositories
            .iter()
            .flat_map(|r| &r.rows)
            .filter(|row| row.status == Status::Active)
            .map(|row| row.username.as_str())
            .collect();
        active.sort_unstable();
        active.dedup();
        active.len()
    }
}

/// Build the report rows for every repository.
///
/// Every member gets a row in every repository, in the order `members` is
/// given. Repositories keep the order of `per_repo`.
pub fn assemble(
    organization: &str,
    members: &[Member],
    per_repo: &[(Repository, RepoActivity)],
    threshold: Threshold,
    now: DateTime<Utc>,
) -> OrgReport {
    let repositories = per_repo
        .iter()
        .map(|(repo, activity)| RepoReport {
            repository: repo.name.clone(),
            rows: members
                .iter()
                .map(|member| {
                    let record = activity.record(&member.login);
                    ReportRow {
                        username: member.login.clone(),
                        commits: record.commits,
                        issues: record.issues,
                        pull_requests: record.pull_requests,
                        last_activity: last_activity_display(&record),
                        status: classify(&record, threshold, now),
                    }
                })
                .collect(),
        })
        .collect();

    OrgReport {
        organization: organization.to_string(),
        generated_at: now,
        threshold_days: threshold.as_days(),
        member_count: members.len(),
        repositories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::ActivityEvent;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap()
    }

    fn members() -> Vec<Member> {
        vec![Member::new("alice"), Member::new("bob"), Member::new("carol")]
    }

    fn scenario() -> OrgReport {
        let members = members();
        let mut api = RepoActivity::new(&members);
        api.fold(&ActivityEvent::commit(
            "3f2a",
            Some("alice"),
            Some(Utc.with_ymd_and_hms(2025, 7, 15, 4, 1, 0).unwrap()),
        ));
        api.fold(&ActivityEvent::pull_request(
            Some("carol"),
            Some(Utc.with_ymd_and_hms(2025, 7, 2, 0, 0, 0).unwrap()),
        ));
        let docs = RepoActivity::new(&members);

        let per_repo = vec![
            (Repository::new("octo-org", "api"), api),
            (Repository::new("octo-org", "docs"), docs),
        ];
        assemble("octo-org", &members, &per_repo, Threshold::days(60), now())
    }

    #[test]
    fn test_every_member_has_a_row_in_every_repo() {
        let report = scenario();
        assert_eq!(report.repositories.len(), 2);
        for repo in &report.repositories {
            let names: Vec<_> = repo.rows.iter().map(|r| r.username.as_str()).collect();
            assert_eq!(names, vec!["alice", "bob", "carol"]);
        }
    }

    #[test]
    fn test_repository_order_is_preserved() {
        let report = scenario();
        let names: Vec<_> = report
            .repositories
            .iter()
            .map(|r| r.repository.as_str())
            .collect();
        assert_eq!(names, vec!["api", "docs"]);
    }

    #[test]
    fn test_scenario_rows() {
        let report = scenario();
        let rows = &report.repositories[0].rows;

        assert_eq!(
            rows[0],
            ReportRow {
                username: "alice".to_string(),
                commits: 1,
                issues: 0,
                pull_requests: 0,
                last_activity: "2025-07-15T04:01:00Z".to_string(),
                status: Status::Active,
            }
        );
        assert_eq!(
            rows[1],
            ReportRow {
                username: "bob".to_string(),
                commits: 0,
                issues: 0,
                pull_requests: 0,
                last_activity: "N/A".to_string(),
                status: Status::Inactive,
            }
        );
        assert_eq!(rows[2].pull_requests, 1);
        assert_eq!(rows[2].status, Status::Inactive);
    }

    #[test]
    fn test_empty_repository_is_all_inactive() {
        let report = scenario();
        let docs = &report.repositories[1];
        assert!(docs.rows.iter().all(|r| r.status == Status::Inactive));
        assert!(docs.rows.iter().all(|r| r.last_activity == "N/A"));
    }

    #[test]
    fn test_active_members() {
        assert_eq!(scenario().active_members(), 1);
    }

    #[test]
    fn test_no_repositories() {
        let report = assemble("octo-org", &members(), &[], Threshold::default(), now());
        assert!(report.repositories.is_empty());
        assert_eq!(report.threshold_days, 60);
        assert_eq!(report.member_count, 3);
    }
}
