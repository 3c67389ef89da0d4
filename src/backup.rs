use anyhow::Error;
use log::{error, info, warn};
use stack_string::{format_sstr, StackString};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;

use crate::{
    config::{Config, FailurePolicy, SourceContainer, StorageKey},
    copy_tool::{CopyExecutor, CopyJob, CopyStatus},
    credentials::KeyProvider,
    error::BackupError,
    naming::{generate, resolve_unique_name},
    storage::{container_url, ContainerStore},
};

/// Read-only state shared by every container of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub timestamp: OffsetDateTime,
    pub log_directory: PathBuf,
    pub destination_account: StackString,
    pub destination_key: StorageKey,
    pub max_name_attempts: usize,
    pub failure_policy: FailurePolicy,
}

impl RunContext {
    #[must_use]
    pub fn new(
        config: &Config,
        base_directory: &Path,
        destination_key: StorageKey,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            timestamp,
            log_directory: config.log_directory(base_directory),
            destination_account: config.destination_storage_account.storage_account.clone(),
            destination_key,
            max_name_attempts: config.max_name_attempts,
            failure_policy: config.failure_policy,
        }
    }

    /// `<log_directory>/<untruncated destination name>-log.txt`
    #[must_use]
    pub fn log_path(&self, source_name: &str) -> PathBuf {
        let name = generate(source_name, "", &self.timestamp);
        self.log_directory.join(format_sstr!("{name}-log.txt").as_str())
    }
}

#[derive(Debug)]
pub enum ContainerOutcome {
    Copied {
        destination: StackString,
        status: CopyStatus,
        log_path: PathBuf,
    },
    Failed {
        error: Error,
    },
}

#[derive(Debug)]
pub struct ContainerReport {
    pub source_account: StackString,
    pub source_container: StackString,
    pub outcome: ContainerOutcome,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<ContainerReport>,
}

impl RunSummary {
    #[must_use]
    pub fn copied(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, ContainerOutcome::Copied { .. }))
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.len() - self.copied()
    }

    /// Copies whose tool exited with a non-zero status.
    #[must_use]
    pub fn copy_errors(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| {
                matches!(r.outcome, ContainerOutcome::Copied { status, .. } if !status.success())
            })
            .count()
    }
}

pub struct ContainerBackup<S, C, K> {
    context: RunContext,
    store: S,
    executor: C,
    keys: K,
}

impl<S, C, K> ContainerBackup<S, C, K>
where
    S: ContainerStore,
    C: CopyExecutor,
    K: KeyProvider,
{
    pub fn new(context: RunContext, store: S, executor: C, keys: K) -> Self {
        Self {
            context,
            store,
            executor,
            keys,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Back up every source container in order.
    ///
    /// # Errors
    /// Return error if the copy tool is missing, the log directory can't be
    /// created, or a container fails under `FailurePolicy::Abort`
    pub async fn run(&self, sources: &[SourceContainer]) -> Result<RunSummary, Error> {
        if !self.executor.is_available() {
            return Err(BackupError::CopyToolNotFound(self.executor.program().into()).into());
        }
        fs::create_dir_all(&self.context.log_directory).await?;

        let mut summary = RunSummary::default();
        for source in sources {
            info!(
                "backing up {}/{}",
                source.storage_account, source.container_name
            );
            let outcome = match self.backup_container(source).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if self.context.failure_policy == FailurePolicy::Abort {
                        return Err(e);
                    }
                    error!(
                        "backup of {}/{} failed: {e}",
                        source.storage_account, source.container_name
                    );
                    ContainerOutcome::Failed { error: e }
                }
            };
            summary.reports.push(ContainerReport {
                source_account: source.storage_account.clone(),
                source_container: source.container_name.clone(),
                outcome,
            });
        }
        Ok(summary)
    }

    async fn backup_container(&self, source: &SourceContainer) -> Result<ContainerOutcome, Error> {
        let source_key = self.keys.storage_key(&source.account())?;
        let log_path = self.context.log_path(source.container_name.as_str());

        let destination = resolve_unique_name(
            &self.store,
            source.container_name.as_str(),
            &self.context.timestamp,
            self.context.max_name_attempts,
        )
        .await?;
        info!("creating container {destination}");
        self.store.create_container(destination.as_str()).await?;

        let job = CopyJob {
            source: container_url(
                source.storage_account.as_str(),
                source.container_name.as_str(),
            )?,
            source_key,
            destination: container_url(
                self.context.destination_account.as_str(),
                destination.as_str(),
            )?,
            destination_key: self.context.destination_key.clone(),
        };
        info!(
            "copying {} to {}, output in {}",
            job.source,
            job.destination,
            log_path.to_string_lossy()
        );
        let log_file = fs::File::create(&log_path).await?.into_std().await;
        let status = self.executor.run(&job, log_file).await?;
        if status.success() {
            info!("finished {destination}");
        } else {
            warn!(
                "{} exited with {:?} copying into {destination}, see {}",
                self.executor.program(),
                status.0,
                log_path.to_string_lossy()
            );
        }
        Ok(ContainerOutcome::Copied {
            destination,
            status,
            log_path,
        })
    }
}
