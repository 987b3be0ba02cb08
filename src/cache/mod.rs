mod options;
mod status;

pub use options::{OptionsCache, OptionsSnapshot};
pub use status::{CachedStatus, StatusCache, StatusResult};
