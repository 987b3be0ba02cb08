use anyhow::{bail, Result};
use semgate::SemesterData;

use super::format::FormatService;

pub(super) struct OptionsService<'s> {
    data: &'s SemesterData,
}

impl<'s> OptionsService<'s> {
    pub fn new(data: &'s SemesterData) -> Self {
        Self { data }
    }

    pub async fn list(&self, refresh: bool, role: Option<&str>) -> Result<()> {
        self.data.load(refresh).await;
        let snapshot = self.data.options();
        if !snapshot.error.is_empty() {
            bail!(snapshot.error);
        }

        let options = self.data.visible_options(role);
        if options.is_empty() {
            FormatService::info("No semesters found");
            return Ok(());
        }

        let active_idx = snapshot
            .current
            .as_deref()
            .and_then(|current| options.iter().position(|it| it.value == current));
        let descriptors = options
            .iter()
            .map(|option| match option.value.as_str() {
                "" => option.label.clone(),
                value => format!("{} ({})", option.label, value),
            })
            .collect();

        FormatService::active_item_table(descriptors, |idx| Some(idx) == active_idx);
        Ok(())
    }

    pub async fn current(&self) -> Result<()> {
        self.data.load(false).await;
        match self.data.current() {
            Some(current) => println!("{}", current),
            None => {
                let error = self.data.options().error;
                if !error.is_empty() {
                    bail!(error);
                }
                FormatService::info("The backend reports no current semester");
            }
        }
        Ok(())
    }
}
