pub mod activity;
pub mod classify;
pub mod repo;
pub mod report;

pub use activity::{ActivityEvent, ActivityKind, FoldOutcome, RepoActivity};
pub use classify::Threshold;
pub use repo::{normalize_members, Member, Repository};
pub use report::{assemble, OrgReport};
