use anyhow::Result;
use semgate::SemesterData;

use crate::cli::InvalidateTarget;

use super::format::FormatService;

pub(super) struct CacheService<'s> {
    data: &'s SemesterData,
}

impl<'s> CacheService<'s> {
    pub fn new(data: &'s SemesterData) -> Self {
        Self { data }
    }

    pub fn select(&self, key: Option<String>) -> Result<()> {
        let key = key.filter(|it| !it.trim().is_empty());
        self.data.select(key.as_deref());
        match key {
            Some(key) => FormatService::success(&format!("Selected semester '{}'", key)),
            None => FormatService::success("Cleared the selected semester"),
        }
        Ok(())
    }

    pub fn invalidate(&self, target: InvalidateTarget) -> Result<()> {
        let what = match target {
            InvalidateTarget::Options => {
                self.data.invalidate();
                "semester options"
            }
            InvalidateTarget::Status => {
                self.data.invalidate_status();
                "semester statuses"
            }
            InvalidateTarget::All => {
                self.data.invalidate_all();
                "all semester data"
            }
        };
        FormatService::success(&format!("Invalidated {}", what));
        Ok(())
    }
}
