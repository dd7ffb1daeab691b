use std::sync::Arc;

use async_trait::async_trait;
use chub_config::JsonCredentialFetcher;
use chub_credhub::{HttpSecretStoreClient, SecretStoreClient};
use chub_git::{CredhubSecretFetcher, GitError};

/// Bridges the one concrete [`HttpSecretStoreClient`] to the small seam
/// traits `chub-git` (`azSecret-credhub-ref`) and `chub-config`
/// (`CREDHUB-REF` bootstrap) each define for themselves, so neither crate
/// needs to depend on `chub-credhub`'s concrete type.
pub struct StoreAdapter(pub Arc<HttpSecretStoreClient>);

#[async_trait]
impl CredhubSecretFetcher for StoreAdapter {
    async fn fetch_secret(&self, credhub_ref: &str) -> Result<String, GitError> {
        let credential = self
            .0
            .get_json_by_name(credhub_ref)
            .await
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?;
        credential
            .get("secret")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GitError::TokenAcquisition(format!("credential {credhub_ref} has no secret field"))
            })
    }
}

#[async_trait]
impl JsonCredentialFetcher for StoreAdapter {
    async fn get_json_by_name(&self, name: &str) -> Result<serde_json::Value, String> {
        let credential = self.0.get_json_by_name(name).await.map_err(|e| e.to_string())?;
        Ok(serde_json::Value::Object(credential.into_iter().collect()))
    }
}
