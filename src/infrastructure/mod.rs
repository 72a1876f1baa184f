pub mod csv_report;
pub mod github_api;

pub use csv_report::save_report;
pub use github_api::{FetchError, GitHubClient, PacingPolicy};
