use std::{process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use semgate::domain::{BackendFile, Config, FileStore};
use semgate::{SemesterData, SignalMedium};
use service::Service;

mod cli;
mod service;

const LOG_ENV: &str = "SEMGATE_LOG";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    if let Commands::Completions { shell } = args.command {
        let mut command = Cli::command();
        let name = command.get_name().to_string();
        clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    init_tracing();

    let mut config = match args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::new()?,
    };
    if let Some(context) = args.context {
        config.set_context_dir(context);
    }

    let store = Arc::new(FileStore::new(config.context_dir()?.data_file()));
    let source = BackendFile::new(config.backend());
    let journal = FileStore::new(config.signal_journal());
    let bus = SignalMedium::journaled(Arc::new(journal))
        .attach()
        .remembering(store.clone());
    let data = SemesterData::new(store, Arc::new(source), bus.clone())
        .with_all_option_policy(config.all_option().clone());
    // Invalidations made from other context directories since the last run.
    bus.catch_up();

    let service = Service::new(data, config.role().map(str::to_owned));
    if service.run(args.command).await {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
