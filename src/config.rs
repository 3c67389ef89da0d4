use anyhow::{format_err, Error};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use stack_string::StackString;
use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
};

use crate::error::BackupError;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const HOME_ENV_VAR: &str = "CONTAINER_BACKUP_HOME";
pub const DEFAULT_COPY_TOOL: &str = "azcopy";
pub const DEFAULT_MAX_NAME_ATTEMPTS: usize = 1000;

#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    pub destination_storage_account: StorageAccount,
    pub relative_log_path: PathBuf,
    pub source_containers: Vec<SourceContainer>,
    #[serde(default = "default_copy_tool")]
    pub copy_tool: StackString,
    #[serde(default = "default_max_name_attempts")]
    pub max_name_attempts: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_copy_tool() -> StackString {
    DEFAULT_COPY_TOOL.into()
}

fn default_max_name_attempts() -> usize {
    DEFAULT_MAX_NAME_ATTEMPTS
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StorageAccount {
    pub storage_account: StackString,
    #[serde(default)]
    pub storage_key: Option<StorageKey>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SourceContainer {
    pub storage_account: StackString,
    pub container_name: StackString,
    #[serde(default)]
    pub storage_key: Option<StorageKey>,
}

impl SourceContainer {
    #[must_use]
    pub fn account(&self) -> StorageAccount {
        StorageAccount {
            storage_account: self.storage_account.clone(),
            storage_key: self.storage_key.clone(),
        }
    }
}

/// Shared key for a storage account. `Debug` never prints the secret.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct StorageKey(StackString);

impl StorageKey {
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for StorageKey {
    fn from(item: &str) -> Self {
        Self(item.into())
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StorageKey(<redacted>)")
    }
}

/// What to do with the rest of the run once one container fails.
#[derive(Serialize, Deserialize, Display, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    #[display("continue")]
    Continue,
    #[display("abort")]
    Abort,
}

impl Config {
    /// # Errors
    /// Return error if the file can't be read, doesn't parse or fails
    /// validation
    pub fn new(config_file: &Path) -> Result<Self, Error> {
        if !config_file.exists() {
            return Err(format_err!(
                "Config file {} does not exist",
                config_file.to_string_lossy()
            ));
        }
        let data = fs::read_to_string(config_file)?;
        Self::from_toml(&data)
    }

    /// # Errors
    /// Return error if `data` isn't a valid config document
    pub fn from_toml(data: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BackupError> {
        if self.destination_storage_account.storage_account.is_empty() {
            return Err(invalid("destination storage_account is empty"));
        }
        if self.source_containers.is_empty() {
            return Err(invalid("no source_containers configured"));
        }
        for source in &self.source_containers {
            if source.storage_account.is_empty() || source.container_name.is_empty() {
                return Err(invalid(
                    "source container entries need storage_account and container_name",
                ));
            }
        }
        if self.max_name_attempts == 0 {
            return Err(invalid("max_name_attempts must be at least 1"));
        }
        if self.copy_tool.is_empty() {
            return Err(invalid("copy_tool is empty"));
        }
        Ok(())
    }

    /// Directory the log files of a run are written to.
    #[must_use]
    pub fn log_directory(&self, base_directory: &Path) -> PathBuf {
        base_directory.join(&self.relative_log_path)
    }
}

fn invalid(msg: &str) -> BackupError {
    BackupError::InvalidConfig(msg.into())
}

/// Directory config and logs are anchored to: `$CONTAINER_BACKUP_HOME`,
/// else the directory holding the executable.
///
/// # Errors
/// Return error if the executable path can't be determined
pub fn base_directory() -> Result<PathBuf, Error> {
    if let Some(home) = std::env::var_os(HOME_ENV_VAR) {
        return Ok(home.into());
    }
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| format_err!("No parent directory for {}", exe.to_string_lossy()))
}
