use anyhow::Error;
use stack_string::{format_sstr, StackString};

use crate::{
    config::{StorageAccount, StorageKey},
    error::BackupError,
};

/// Source of the shared keys used to talk to storage accounts.
pub trait KeyProvider {
    /// # Errors
    /// Return error if no key is available for the account
    fn storage_key(&self, account: &StorageAccount) -> Result<StorageKey, Error>;
}

type EnvLookup = fn(&str) -> Option<String>;

/// Keys from the config file, falling back to
/// `AZURE_STORAGE_KEY_<ACCOUNT>` in the environment.
#[derive(Clone, Copy)]
pub struct ConfigKeyProvider {
    env_lookup: EnvLookup,
}

impl Default for ConfigKeyProvider {
    fn default() -> Self {
        Self::with_env_lookup(|var| std::env::var(var).ok())
    }
}

impl ConfigKeyProvider {
    /// Use `env_lookup` instead of the process environment for fallbacks.
    #[must_use]
    pub fn with_env_lookup(env_lookup: EnvLookup) -> Self {
        Self { env_lookup }
    }

    #[must_use]
    pub fn env_var_name(account: &str) -> StackString {
        let account = account.to_uppercase().replace('-', "_");
        format_sstr!("AZURE_STORAGE_KEY_{account}")
    }
}

impl KeyProvider for ConfigKeyProvider {
    fn storage_key(&self, account: &StorageAccount) -> Result<StorageKey, Error> {
        if let Some(key) = &account.storage_key {
            return Ok(key.clone());
        }
        let var = Self::env_var_name(account.storage_account.as_str());
        match (self.env_lookup)(var.as_str()) {
            Some(key) if !key.is_empty() => Ok(key.as_str().into()),
            _ => Err(BackupError::MissingStorageKey(account.storage_account.clone()).into()),
        }
    }
}
