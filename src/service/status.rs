use anyhow::{Context, Result};
use semgate::SemesterData;

use super::{format::FormatService, resolve_key};

pub(super) struct StatusService<'s> {
    data: &'s SemesterData,
}

impl<'s> StatusService<'s> {
    pub fn new(data: &'s SemesterData) -> Self {
        Self { data }
    }

    pub async fn status(&self, key: Option<String>, refresh: bool) -> Result<()> {
        let key = resolve_key(self.data, key)?;
        let record = self
            .data
            .fetch_status(&key, refresh)
            .await
            .with_context(|| format!("Failed to load the status of '{}'", key))?;

        let Some(record) = record else {
            FormatService::info(&format!("The backend knows no status for '{}'", key));
            return Ok(());
        };
        println!("Semester: {}", key);
        if let Some(identity) = &record.identity {
            println!("Active:   {}", identity);
        }
        match record.state {
            Some(state) => println!("State:    {}", FormatService::state(state)),
            None => println!("State:    -"),
        }
        println!(
            "Changes:  {}",
            FormatService::writable(self.data.is_writable_cached(Some(&key)))
        );
        Ok(())
    }

    pub async fn writable(&self, key: Option<String>) -> Result<()> {
        let key = resolve_key(self.data, key)?;
        let writable = self.data.is_writable(Some(&key)).await;
        if let Some(error) = self.data.status_error(&key) {
            FormatService::warning(&format!("{}, assuming changes are allowed", error));
        }
        println!("{}: {}", key, FormatService::writable(writable));
        Ok(())
    }
}
