use super::audit::{audit_organization, ActivitySource, AuditObserver};
use crate::config::AuditConfig;
use crate::domain::{ActivityEvent, ActivityKind, FoldOutcome, Repository};
use crate::infrastructure::{save_report, FetchError};
use anyhow::{bail, Result};
use chrono::Utc;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{debug, error, info, trace, warn};

/// Audit every configured organization and write one CSV report for each.
///
/// An organization whose members or repositories cannot be listed is
/// skipped and reported at the end; bad credentials stop the run at once.
/// Spinners are drawn on `progress` when given.
pub async fn run_audit<S: ActivitySource>(
    source: &S,
    config: &AuditConfig,
    progress: Option<&MultiProgress>,
) -> Result<AuditSummary> {
    let mut summary = AuditSummary::default();
    let mut failed = Vec::new();

    for org in &config.organizations {
        info!(org = %org, threshold_days = config.threshold.as_days(), "Checking organization");
        let mut observer = ProgressObserver::new(org, progress)?;

        match audit_organization(source, org, config.threshold, Utc::now(), &mut observer).await {
            Ok(report) => {
                let path = save_report(&report, &config.output_dir)?;
                info!(org = %org, path = %path.display(), "CSV saved");

                let result = OrgResult {
                    organization: org.clone(),
                    repositories: report.repositories.len(),
                    members: report.member_count,
                    active_members: report.active_members(),
                    path,
                };
                observer.finish(&format!("✅ {}", result));
                summary.organizations.push(result);
            }
            Err(err) => {
                observer.abandon();
                let fatal = err
                    .downcast_ref::<FetchError>()
                    .is_some_and(FetchError::is_fatal);
                if fatal {
                    return Err(err);
                }
                error!(org = %org, "{err:#}");
                failed.push(org.clone());
            }
        }
    }

    if !failed.is_empty() {
        bail!("Audit failed for organization(s): {}", failed.join(", "));
    }

    Ok(summary)
}

/// Drives the spinner and logs progress of one organization's audit
struct ProgressObserver {
    org: String,
    spinner: Option<ProgressBar>,
}

impl ProgressObserver {
    fn new(org: &str, progress: Option<&MultiProgress>) -> Result<Self> {
        let spinner = if let Some(progress) = progress {
            let pb = progress.add(ProgressBar::new_spinner());
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_style(
                ProgressStyle::default_spinner()
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
                    .template("{spinner:.magenta.bold} {msg}")?,
            );
            pb.set_message(format!("🔍 Checking organization {}...", org));
            Some(pb)
        } else {
            None
        };

        Ok(Self {
            org: org.to_string(),
            spinner,
        })
    }

    fn message(&self, msg: String) {
        if let Some(ref pb) = self.spinner {
            pb.set_message(msg);
        }
    }

    fn finish(self, msg: &str) {
        if let Some(pb) = self.spinner {
            pb.finish_with_message(msg.to_string());
        }
    }

    fn abandon(self) {
        if let Some(pb) = self.spinner {
            pb.abandon_with_message(format!("❌ {}", self.org));
        }
    }
}

impl AuditObserver for ProgressObserver {
    fn organization_started(&mut self, org: &str, members: usize, repositories: usize) {
        info!(org, members, repositories, "Fetched members and repositories");
    }

    fn repository_started(&mut self, repo: &Repository, index: usize, total: usize) {
        debug!(repo = %repo, "Repository");
        self.message(format!("📦 [{}/{}] {}", index + 1, total, repo.name));
    }

    fn branch_started(&mut self, repo: &Repository, branch: &str) {
        debug!(repo = %repo, branch, "Branch");
        self.message(format!("🌿 {} @ {}", repo.name, branch));
    }

    fn event_folded(&mut self, repo: &Repository, event: &ActivityEvent, outcome: FoldOutcome) {
        let author = event.author.as_deref().unwrap_or("<none>");
        match &event.kind {
            ActivityKind::Commit { sha } => {
                trace!(repo = %repo, sha = %sha, author, ?outcome, "Commit");
            }
            ActivityKind::Issue => {
                debug!(repo = %repo, author, created = ?event.timestamp, ?outcome, "Issue");
            }
            ActivityKind::PullRequest => {
                debug!(repo = %repo, author, created = ?event.timestamp, ?outcome, "Pull request");
            }
        }
    }

    fn stream_skipped(&mut self, repo: &Repository, stream: &str, error: &FetchError) {
        warn!(repo = %repo, "Skipping {}: {}", stream, error);
    }
}

/// Outcome of one organization's audit
#[derive(Debug)]
pub struct OrgResult {
    pub organization: String,
    pub repositories: usize,
    pub members: usize,
    pub active_members: usize,
    pub path: PathBuf,
}

impl std::fmt::Display for OrgResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} repo(s), {}/{} member(s) active -> {}",
            self.organization,
            self.repositories,
            self.active_members,
            self.members,
            self.path.display()
        )
    }
}

#[derive(Debug, Default)]
pub struct AuditSummary {
    pub organizations: Vec<OrgResult>,
}

impl std::fmt::Display for AuditSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Audited {} organization(s)", self.organizations.len())?;
        for org in &self.organizations {
            write!(f, "\n  {}", org)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Member, Threshold};
    use chrono::TimeDelta;
    use crate::infrastructure::PacingPolicy;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// One member and one repository per organization, unless the
    /// organization is listed in `broken`
    #[derive(Default)]
    struct OrgSource {
        broken: HashMap<&'static str, fn() -> FetchError>,
        listed: Mutex<Vec<String>>,
    }

    impl ActivitySource for OrgSource {
        async fn list_members(&self, org: &str) -> Result<Vec<Member>, FetchError> {
            self.listed.lock().unwrap().push(org.to_string());
            match self.broken.get(org) {
                Some(make_error) => Err(make_error()),
                None => Ok(vec![Member::new("alice"), Member::new("bob")]),
            }
        }

        async fn list_repositories(&self, org: &str) -> Result<Vec<Repository>, FetchError> {
            Ok(vec![Repository::new(org, "api")])
        }

        async fn list_branches(&self, _repo: &Repository) -> Result<Vec<String>, FetchError> {
            Ok(Vec::new())
        }

        async fn commit_events(&self, _repo: &Repository, _branch: &str) -> Result<Vec<ActivityEvent>, FetchError> {
            Ok(Vec::new())
        }

        async fn issue_events(&self, _repo: &Repository) -> Result<Vec<ActivityEvent>, FetchError> {
            Ok(vec![ActivityEvent::issue(Some("alice"), Some(Utc::now() - TimeDelta::days(1)))])
        }

        async fn pull_request_events(&self, _repo: &Repository) -> Result<Vec<ActivityEvent>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn config(orgs: &[&str], output_dir: &Path) -> AuditConfig {
        AuditConfig {
            organizations: orgs.iter().map(|o| o.to_string()).collect(),
            threshold: Threshold::default(),
            token: "test-token".to_string(),
            output_dir: output_dir.to_path_buf(),
            pacing: PacingPolicy::default(),
        }
    }

    fn written_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_every_organization_gets_a_report() {
        let dir = TempDir::new().unwrap();
        let source = OrgSource::default();

        let summary = run_audit(&source, &config(&["octo-org", "acme"], dir.path()), None)
            .await
            .unwrap();

        assert_eq!(summary.organizations.len(), 2);
        assert_eq!(summary.organizations[0].members, 2);
        assert_eq!(summary.organizations[0].active_members, 1);

        let files = written_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].starts_with("acme_user_activity_"));
        assert!(files[1].starts_with("octo-org_user_activity_"));
    }

    #[tokio::test]
    async fn test_failed_organization_does_not_stop_the_others() {
        let dir = TempDir::new().unwrap();
        let source = OrgSource {
            broken: HashMap::from([(
                "broken-org",
                (|| FetchError::Status { status: 502, message: "Bad Gateway".to_string() }) as fn() -> FetchError,
            )]),
            ..Default::default()
        };

        let err = run_audit(&source, &config(&["broken-org", "octo-org"], dir.path()), None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("broken-org"));
        assert!(!err.to_string().contains("octo-org"));
        assert_eq!(*source.listed.lock().unwrap(), vec!["broken-org", "octo-org"]);

        let files = written_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("octo-org_user_activity_"));
    }

    #[tokio::test]
    async fn test_bad_credentials_stop_before_any_report() {
        let dir = TempDir::new().unwrap();
        let source = OrgSource {
            broken: HashMap::from([(
                "locked-org",
                (|| FetchError::Unauthorized("Bad credentials".to_string())) as fn() -> FetchError,
            )]),
            ..Default::default()
        };

        let err = run_audit(&source, &config(&["locked-org", "octo-org"], dir.path()), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Unauthorized(_))
        ));
        assert_eq!(*source.listed.lock().unwrap(), vec!["locked-org"]);
        assert!(written_files(dir.path()).is_empty());
    }

    #[test]
    fn test_summary_display() {
        let summary = AuditSummary {
            organizations: vec![OrgResult {
                organization: "octo-org".to_string(),
                repositories: 4,
                members: 9,
                active_members: 5,
                path: PathBuf::from("octo-org_user_activity_20250901_000000.csv"),
            }],
        };
        assert_eq!(
            summary.to_string(),
            "Audited 1 organization(s)\n  octo-org: 4 repo(s), 5/9 member(s) active -> octo-org_user_activity_20250901_000000.csv"
        );
    }
}
