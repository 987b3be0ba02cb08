mod cache;
mod format;
mod options;
mod service;
mod status;

use anyhow::{bail, Result};
use semgate::SemesterData;

pub(crate) use service::Service;

/// The key given on the command line, or else the selected semester.
fn resolve_key(data: &SemesterData, key: Option<String>) -> Result<String> {
    match key.filter(|it| !it.trim().is_empty()).or_else(|| data.selected()) {
        Some(key) => Ok(key),
        None => bail!("No semester given and none selected. Pass a KEY or run 'sg select KEY'."),
    }
}
