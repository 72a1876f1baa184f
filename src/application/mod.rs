pub mod audit;
pub mod run_audit;

pub use audit::ActivitySource;
pub use run_audit::run_audit;
