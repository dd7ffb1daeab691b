use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CredhubError;

/// The secret store's client/server contract (list by path prefix, fetch
/// JSON by name, write JSON by name) — an opaque external collaborator.
///
/// `CredhubSource` depends only on this trait; [`HttpSecretStoreClient`] is
/// the production implementation, and tests exercise it against a
/// `wiremock` server rather than a hand-written fake, the same way
/// `chub-git`'s token providers are tested.
#[async_trait]
pub trait SecretStoreClient: Send + Sync {
    /// List every credential name found beneath `path`.
    async fn find_by_path(&self, path: &str) -> Result<Vec<String>, CredhubError>;

    /// Fetch a credential's JSON value by its full name.
    async fn get_json_by_name(&self, name: &str) -> Result<BTreeMap<String, Value>, CredhubError>;

    /// Write a credential's JSON value by its full name, creating it if absent.
    async fn set_json_by_name(
        &self,
        name: &str,
        value: BTreeMap<String, Value>,
    ) -> Result<(), CredhubError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct FindByPathResponse {
    credentials: Vec<CredentialRef>,
}

#[derive(Deserialize)]
struct CredentialRef {
    name: String,
}

#[derive(Deserialize)]
struct DataResponse {
    data: Vec<DataEntry>,
}

#[derive(Deserialize)]
struct DataEntry {
    value: BTreeMap<String, Value>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// HTTP-backed [`SecretStoreClient`] talking to a CredHub-compatible server:
/// UAA client-credentials auth followed by the `/api/v1/data` REST surface.
pub struct HttpSecretStoreClient {
    http: reqwest::Client,
    api_base: String,
    uaa_base: String,
    client: String,
    secret: String,
    cached_token: Mutex<Option<CachedToken>>,
}

impl HttpSecretStoreClient {
    /// Construct a client against `api_base` (the CredHub server) using
    /// `uaa_base` (the token issuer) for client-credentials auth.
    pub fn new(api_base: String, uaa_base: String, client: String, secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            uaa_base,
            client,
            secret,
            cached_token: Mutex::new(None),
        }
    }

    async fn token(&self) -> Result<String, CredhubError> {
        {
            let guard = self.cached_token.lock().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > SystemTime::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut guard = self.cached_token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > SystemTime::now() {
                return Ok(cached.token.clone());
            }
        }

        debug!(client = %self.client, "acquiring credhub access token");
        let response = self
            .http
            .post(format!("{}/oauth/token", self.uaa_base))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client.as_str()),
                ("client_secret", self.secret.as_str()),
                ("response_type", "token"),
            ])
            .send()
            .await
            .map_err(|e| CredhubError::StoreUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| CredhubError::StoreUnavailable(e.to_string()))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredhubError::StoreUnavailable(e.to_string()))?;

        let cached = CachedToken {
            token: response.access_token.clone(),
            expires_at: SystemTime::now() + Duration::from_secs(response.expires_in),
        };
        *guard = Some(cached.clone());
        Ok(cached.token)
    }

    async fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, CredhubError> {
        let token = self.token().await?;
        builder
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CredhubError::StoreUnavailable(e.to_string()))
    }
}

#[async_trait]
impl SecretStoreClient for HttpSecretStoreClient {
    async fn find_by_path(&self, path: &str) -> Result<Vec<String>, CredhubError> {
        let request = self
            .http
            .get(format!("{}/api/v1/data", self.api_base))
            .query(&[("path", path)]);
        let response = self
            .authed(request)
            .await?
            .error_for_status()
            .map_err(|e| CredhubError::StoreUnavailable(e.to_string()))?
            .json::<FindByPathResponse>()
            .await
            .map_err(|e| CredhubError::StoreUnavailable(e.to_string()))?;
        Ok(response.credentials.into_iter().map(|c| c.name).collect())
    }

    async fn get_json_by_name(&self, name: &str) -> Result<BTreeMap<String, Value>, CredhubError> {
        let request = self
            .http
            .get(format!("{}/api/v1/data", self.api_base))
            .query(&[("name", name), ("current", "true")]);
        let response = self
            .authed(request)
            .await?
            .error_for_status()
            .map_err(|e| CredhubError::CredentialReadFailure {
                name: name.to_string(),
                cause: e.to_string(),
            })?
            .json::<DataResponse>()
            .await
            .map_err(|e| CredhubError::CredentialReadFailure {
                name: name.to_string(),
                cause: e.to_string(),
            })?;
        response
            .data
            .into_iter()
            .next()
            .map(|entry| entry.value)
            .ok_or_else(|| CredhubError::CredentialReadFailure {
                name: name.to_string(),
                cause: "no data entries returned".to_string(),
            })
    }

    async fn set_json_by_name(
        &self,
        name: &str,
        value: BTreeMap<String, Value>,
    ) -> Result<(), CredhubError> {
        let body = serde_json::json!({
            "name": name,
            "type": "json",
            "value": value,
        });
        let request = self
            .http
            .put(format!("{}/api/v1/data", self.api_base))
            .json(&body);
        self.authed(request)
            .await?
            .error_for_status()
            .map_err(|e| CredhubError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}
