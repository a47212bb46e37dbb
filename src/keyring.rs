//! Saved login credentials, kept in the Secret Service keyring per API URL.
//!
//! The server session lives in a cookie that does not outlive one CLI run, so
//! the CLI logs in again from here.

use std::collections::HashMap;

use crate::core::user::Credentials;

pub(crate) const SERVICE_NAME: &str = "tasktree";

#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    #[error("Failed to connect to keyring: {0}")]
    Unavailable(String),
    #[error("Keyring operation failed: {0}")]
    Operation(String),
    #[error("Stored credentials are unreadable: {0}")]
    Corrupt(String),
}

fn attributes(api_url: &str) -> HashMap<&str, &str> {
    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("server", api_url);
    attrs
}

async fn open() -> Result<oo7::Keyring, KeyringError> {
    oo7::Keyring::new()
        .await
        .map_err(|e| KeyringError::Unavailable(e.to_string()))
}

fn encode_secret(credentials: &Credentials) -> Result<Vec<u8>, KeyringError> {
    serde_json::to_vec(credentials).map_err(|e| KeyringError::Corrupt(e.to_string()))
}

fn decode_secret(secret: &[u8]) -> Result<Credentials, KeyringError> {
    serde_json::from_slice(secret).map_err(|e| KeyringError::Corrupt(e.to_string()))
}

/// Save credentials for `api_url`, replacing any already there.
pub async fn store_credentials(api_url: &str, credentials: &Credentials) -> Result<(), KeyringError> {
    let keyring = open().await?;
    let secret = encode_secret(credentials)?;
    keyring
        .create_item(
            &format!("Tasktree ({})", api_url),
            &attributes(api_url),
            secret.as_slice(),
            true,
        )
        .await
        .map_err(|e| KeyringError::Operation(e.to_string()))?;
    log::debug!("Stored credentials for {}", api_url);
    Ok(())
}

pub async fn load_credentials(api_url: &str) -> Result<Option<Credentials>, KeyringError> {
    let keyring = open().await?;
    let items = keyring
        .search_items(&attributes(api_url))
        .await
        .map_err(|e| KeyringError::Operation(e.to_string()))?;

    let Some(item) = items.first() else {
        return Ok(None);
    };
    let secret = item
        .secret()
        .await
        .map_err(|e| KeyringError::Operation(e.to_string()))?;
    decode_secret(&secret).map(Some)
}

pub async fn delete_credentials(api_url: &str) -> Result<(), KeyringError> {
    let keyring = open().await?;
    let items = keyring
        .search_items(&attributes(api_url))
        .await
        .map_err(|e| KeyringError::Operation(e.to_string()))?;

    for item in items {
        item.delete()
            .await
            .map_err(|e| KeyringError::Operation(e.to_string()))?;
    }
    Ok(())
}
