mod listing;

pub use listing::{parse_listing, InstalledModel, ModelLister, OllamaCli};
