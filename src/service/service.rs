use semgate::SemesterData;

use crate::cli::Commands;

use super::{
    cache::CacheService, format::FormatService, options::OptionsService, status::StatusService,
};

pub struct Service {
    data: SemesterData,
    /// Role from the config, used when `--role` is not given.
    role: Option<String>,
}

impl Service {
    pub fn new(data: SemesterData, role: Option<String>) -> Service {
        Service { data, role }
    }

    /// Runs one command and reports its failure, if any. Returns whether the
    /// command succeeded.
    pub async fn run(&self, command: Commands) -> bool {
        let res = match command {
            Commands::Options { refresh, role } => {
                let role = role.or_else(|| self.role.clone());
                OptionsService::new(&self.data)
                    .list(refresh, role.as_deref())
                    .await
            }
            Commands::Current => OptionsService::new(&self.data).current().await,
            Commands::Status { key, refresh } => {
                StatusService::new(&self.data).status(key, refresh).await
            }
            Commands::Writable { key } => StatusService::new(&self.data).writable(key).await,
            Commands::Select { key } => CacheService::new(&self.data).select(key),
            Commands::Invalidate { target } => CacheService::new(&self.data).invalidate(target),
            Commands::Completions { .. } => Ok(()),
        };

        match res {
            Ok(()) => true,
            Err(err) => {
                FormatService::error(&format!("{:#}", err));
                false
            }
        }
    }
}
