use crate::domain::OrgReport;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER: [&str; 6] = ["Username", "Commits", "Issues", "PRs", "Last Activity", "Status"];

/// `<org>_user_activity_<YYYYmmdd_HHMMSS>.csv`, stamped with the report time
pub fn report_file_name(report: &OrgReport) -> String {
    format!(
        "{}_user_activity_{}.csv",
        report.organization,
        report.generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Write the report as CSV: for each repository a title line, the header,
/// one row per member and a blank separator line.
pub fn write_report<W: Write>(report: &OrgReport, mut out: W) -> Result<()> {
    let mut builder = csv::WriterBuilder::new();
    builder.flexible(true).terminator(csv::Terminator::Any(b'\n'));

    for repo in &report.repositories {
        let mut writer = builder.from_writer(&mut out);
        writer.write_record([format!("Repository: {}", repo.repository)])?;
        writer.write_record(HEADER)?;

        for row in &repo.rows {
            writer.write_record([
                row.username.clone(),
                row.commits.to_string(),
                row.issues.to_string(),
                row.pull_requests.to_string(),
                row.last_activity.clone(),
                row.status.to_string(),
            ])?;
        }
        writer.flush()?;
        drop(writer);

        // blank separator line goes straight to the sink
        out.write_all(b"\n")?;
    }

    out.flush()?;
    Ok(())
}

/// Write the report to a new file in `dir`, returning its path
pub fn save_report(report: &OrgReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(report_file_name(report));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_report(report, file)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}
