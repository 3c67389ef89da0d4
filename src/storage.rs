use anyhow::{format_err, Error};
use async_trait::async_trait;
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder};
use log::debug;
use stack_string::format_sstr;
use url::Url;

use crate::config::StorageKey;

/// The two container operations a backup run needs from the destination
/// account.
#[async_trait]
pub trait ContainerStore {
    /// # Errors
    /// Return error if the service can't be queried
    async fn container_exists(&self, name: &str) -> Result<bool, Error>;

    /// # Errors
    /// Return error if the container can't be created
    async fn create_container(&self, name: &str) -> Result<(), Error>;
}

pub struct AzureContainerStore {
    account: String,
    client: BlobServiceClient,
}

impl AzureContainerStore {
    #[must_use]
    pub fn new(account: &str, key: &StorageKey) -> Self {
        let credentials = StorageCredentials::access_key(account, key.expose().to_string());
        let client = ClientBuilder::new(account, credentials).blob_service_client();
        Self {
            account: account.into(),
            client,
        }
    }
}

#[async_trait]
impl ContainerStore for AzureContainerStore {
    async fn container_exists(&self, name: &str) -> Result<bool, Error> {
        let exists = self.client.container_client(name).exists().await?;
        debug!("{}/{name} exists: {exists}", self.account);
        Ok(exists)
    }

    async fn create_container(&self, name: &str) -> Result<(), Error> {
        self.client.container_client(name).create().await?;
        debug!("created {}/{name}", self.account);
        Ok(())
    }
}

/// `https://<account>.blob.core.windows.net/<container>`
///
/// The container name is always a single path segment.
///
/// # Errors
/// Return error if the account name doesn't form a valid host
pub fn container_url(account: &str, container: &str) -> Result<Url, Error> {
    let mut url = Url::parse(format_sstr!("https://{account}.blob.core.windows.net/").as_str())?;
    url.path_segments_mut()
        .map_err(|()| format_err!("Cannot append to {account}"))?
        .pop_if_empty()
        .push(container);
    Ok(url)
}
