pub mod archive;
mod prompt;

pub use archive::{package, plan_for, PackageOutcome, PackagePlan};
pub use prompt::select_model;
