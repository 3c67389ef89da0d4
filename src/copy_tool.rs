use anyhow::Error;
use async_trait::async_trait;
use log::debug;
use stack_string::StackString;
use std::{fs::File, process::Stdio};
use tokio::process::Command;
use url::Url;

use crate::config::StorageKey;

/// Everything the copy tool needs to replicate one container.
#[derive(Debug, Clone)]
pub struct CopyJob {
    pub source: Url,
    pub source_key: StorageKey,
    pub destination: Url,
    pub destination_key: StorageKey,
}

/// Exit code of a finished copy; `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyStatus(pub Option<i32>);

impl CopyStatus {
    #[must_use]
    pub fn success(self) -> bool {
        self.0 == Some(0)
    }
}

#[async_trait]
pub trait CopyExecutor {
    /// Whether the tool can be run at all on this machine.
    fn is_available(&self) -> bool;

    fn program(&self) -> &str;

    /// Run the copy to completion, writing its combined output to `log_file`.
    ///
    /// # Errors
    /// Return error if the process can't be started
    async fn run(&self, job: &CopyJob, log_file: File) -> Result<CopyStatus, Error>;
}

pub struct AzCopy {
    program: StackString,
}

impl AzCopy {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn args(job: &CopyJob) -> Vec<&str> {
        vec![
            "--source",
            job.source.as_str(),
            "--source-key",
            job.source_key.expose(),
            "--destination",
            job.destination.as_str(),
            "--dest-key",
            job.destination_key.expose(),
            "--recursive",
            "--quiet",
            "--verbose",
        ]
    }
}

#[async_trait]
impl CopyExecutor for AzCopy {
    fn is_available(&self) -> bool {
        which::which(self.program.as_str()).is_ok()
    }

    fn program(&self) -> &str {
        self.program.as_str()
    }

    async fn run(&self, job: &CopyJob, log_file: File) -> Result<CopyStatus, Error> {
        debug!(
            "{} --source {} --destination {}",
            self.program, job.source, job.destination
        );
        let stderr = log_file.try_clone()?;
        let status = Command::new(self.program.as_str())
            .args(Self::args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr))
            .status()
            .await?;
        Ok(CopyStatus(status.code()))
    }
}
