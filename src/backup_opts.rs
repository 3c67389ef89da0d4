use anyhow::Error;
use clap::Parser;
use log::{info, warn, LevelFilter};

use crate::{
    backup::{ContainerBackup, RunContext},
    config::{base_directory, Config, CONFIG_FILE_NAME},
    copy_tool::AzCopy,
    credentials::{ConfigKeyProvider, KeyProvider},
    run_timestamp,
    storage::AzureContainerStore,
};

/// Back up Azure blob containers into timestamped containers of a backup
/// account.
#[derive(Parser, Debug)]
#[command(version)]
pub struct BackupOpts {
    /// Suppress all output but critical errors
    #[arg(long, visible_alias = "silent", conflicts_with = "verbose")]
    pub quiet: bool,
    /// Narrate each step
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    #[must_use]
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Error,
            Self::Normal => LevelFilter::Warn,
            Self::Verbose => LevelFilter::Info,
        }
    }
}

/// Install the logger; `RUST_LOG` overrides the level picked by the flags.
///
/// # Errors
/// Return error if a logger is already installed
pub fn init_logging(verbosity: Verbosity) -> Result<(), Error> {
    env_logger::Builder::new()
        .filter_level(verbosity.level_filter())
        .parse_default_env()
        .try_init()?;
    Ok(())
}

impl BackupOpts {
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// # Errors
    /// Return error if config can't be loaded, the copy tool is missing or
    /// the run is aborted
    pub async fn process_args() -> Result<(), Error> {
        // local offset lookups only succeed while the process is single threaded
        let timestamp = run_timestamp();
        let opts = Self::parse();
        init_logging(opts.verbosity())?;

        let base_directory = base_directory()?;
        let config = Config::new(&base_directory.join(CONFIG_FILE_NAME))?;

        let keys = ConfigKeyProvider::default();
        let destination_key = keys.storage_key(&config.destination_storage_account)?;
        let context = RunContext::new(&config, &base_directory, destination_key, timestamp);
        let store = AzureContainerStore::new(
            context.destination_account.as_str(),
            &context.destination_key,
        );
        let executor = AzCopy::new(config.copy_tool.as_str());

        let backup = ContainerBackup::new(context, store, executor, keys);
        let summary = backup.run(&config.source_containers).await?;
        info!(
            "{} containers copied, {} failed",
            summary.copied(),
            summary.failed()
        );
        if summary.copy_errors() > 0 {
            warn!(
                "{} copies exited with errors, check the logs in {}",
                summary.copy_errors(),
                backup.context().log_directory.to_string_lossy()
            );
        }
        Ok(())
    }
}
