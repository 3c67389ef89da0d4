use stack_string::StackString;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("{0} not found. Aborting")]
    CopyToolNotFound(StackString),
    #[error("no free destination name for {source_name} after {attempts} attempts")]
    NamingExhausted {
        source_name: StackString,
        attempts: usize,
    },
    #[error("no storage key for account {0}")]
    MissingStorageKey(StackString),
    #[error("invalid config: {0}")]
    InvalidConfig(StackString),
}
