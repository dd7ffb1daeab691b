use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::GitError;

/// Azure AD resource scope used by both token providers (spec §4.3).
const AZURE_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

/// Clock-skew guard: a cached token is only reused if it is valid at least
/// this far into the future.
const TOKEN_SKEW: Duration = Duration::from_secs(10);

/// A bearer-token source for an authenticated git remote.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently-valid bearer token, refreshing if the cache is stale.
    async fn token(&self) -> Result<String, GitError>;
}

/// Resolves an `azSecret-credhub-ref` into a plain secret value.
///
/// `chub-git` has no dependency on `chub-credhub`; `chub-server` wires a
/// concrete implementation backed by the same `SecretStoreClient` the
/// credhub source uses.
#[async_trait]
pub trait CredhubSecretFetcher: Send + Sync {
    /// Fetch the named credential's `secret` field.
    async fn fetch_secret(&self, credhub_ref: &str) -> Result<String, GitError>;
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

impl CachedToken {
    fn valid_past_skew(&self) -> bool {
        self.expires_at > SystemTime::now() + TOKEN_SKEW
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

const DEFAULT_AZURE_AD_ENDPOINT: &str = "https://login.microsoftonline.com";

/// Service-principal client-credentials token provider.
pub struct SpnTokenProvider {
    http: reqwest::Client,
    token_endpoint_base: String,
    tenant_id: String,
    client_id: String,
    direct_secret: Option<String>,
    credhub_ref: Option<String>,
    secret_fetcher: Option<std::sync::Arc<dyn CredhubSecretFetcher>>,
    cached_secret: Mutex<Option<(String, SystemTime)>>,
    cached_token: Mutex<Option<CachedToken>>,
}

impl SpnTokenProvider {
    /// Construct a new provider. `secret_fetcher` is required when `credhub_ref` is `Some`.
    pub fn new(
        tenant_id: String,
        client_id: String,
        direct_secret: Option<String>,
        credhub_ref: Option<String>,
        secret_fetcher: Option<std::sync::Arc<dyn CredhubSecretFetcher>>,
    ) -> Self {
        Self::with_endpoint_base(
            DEFAULT_AZURE_AD_ENDPOINT.to_string(),
            tenant_id,
            client_id,
            direct_secret,
            credhub_ref,
            secret_fetcher,
        )
    }

    /// Construct a provider against a non-default Azure AD token endpoint (tests).
    pub fn with_endpoint_base(
        token_endpoint_base: String,
        tenant_id: String,
        client_id: String,
        direct_secret: Option<String>,
        credhub_ref: Option<String>,
        secret_fetcher: Option<std::sync::Arc<dyn CredhubSecretFetcher>>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_endpoint_base,
            tenant_id,
            client_id,
            direct_secret,
            credhub_ref,
            secret_fetcher,
            cached_secret: Mutex::new(None),
            cached_token: Mutex::new(None),
        }
    }

    async fn secret(&self) -> Result<String, GitError> {
        let Some(credhub_ref) = &self.credhub_ref else {
            return self
                .direct_secret
                .clone()
                .ok_or_else(|| GitError::TokenAcquisition("no secret configured".to_string()));
        };

        {
            let guard = self.cached_secret.lock().await;
            if let Some((secret, expiry)) = guard.as_ref() {
                if *expiry > SystemTime::now() {
                    return Ok(secret.clone());
                }
            }
        }

        let mut guard = self.cached_secret.lock().await;
        if let Some((secret, expiry)) = guard.as_ref() {
            if *expiry > SystemTime::now() {
                return Ok(secret.clone());
            }
        }

        let fetcher = self
            .secret_fetcher
            .as_ref()
            .ok_or_else(|| GitError::TokenAcquisition("no credhub secret fetcher wired".to_string()))?;
        let secret = fetcher.fetch_secret(credhub_ref).await?;
        *guard = Some((secret.clone(), SystemTime::now() + Duration::from_secs(24 * 60 * 60)));
        Ok(secret)
    }
}

#[async_trait]
impl TokenProvider for SpnTokenProvider {
    async fn token(&self) -> Result<String, GitError> {
        {
            let guard = self.cached_token.lock().await;
            if let Some(cached) = guard.as_ref() {
                if cached.valid_past_skew() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut guard = self.cached_token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.valid_past_skew() {
                return Ok(cached.token.clone());
            }
        }

        let secret = self.secret().await?;
        debug!(tenant = %self.tenant_id, "acquiring SPN token");
        let response = self
            .http
            .post(format!(
                "{}/{}/oauth2/v2.0/token",
                self.token_endpoint_base, self.tenant_id
            ))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", secret.as_str()),
                ("scope", AZURE_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?
            .error_for_status()
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?;

        let cached = CachedToken {
            token: response.access_token.clone(),
            expires_at: SystemTime::now() + Duration::from_secs(response.expires_in),
        };
        *guard = Some(cached.clone());
        Ok(cached.token)
    }
}

/// Managed-identity workload-identity-federation token provider.
pub struct MiWifTokenProvider {
    http: reqwest::Client,
    token_endpoint_base: String,
    tenant_id: String,
    mi_id: String,
    wif_issuer: String,
    wif_client: String,
    wif_secret: String,
    username: String,
    password: String,
    cached_token: Mutex<Option<CachedToken>>,
}

impl MiWifTokenProvider {
    /// Construct a new provider.
    pub fn new(
        tenant_id: String,
        mi_id: String,
        wif_issuer: String,
        wif_client: String,
        wif_secret: String,
        username: String,
        password: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_endpoint_base: DEFAULT_AZURE_AD_ENDPOINT.to_string(),
            tenant_id,
            mi_id,
            wif_issuer,
            wif_client,
            wif_secret,
            username,
            password,
            cached_token: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn with_endpoint_base(mut self, base: String) -> Self {
        self.token_endpoint_base = base;
        self
    }

    async fn federated_token(&self) -> Result<String, GitError> {
        let response = self
            .http
            .post(&self.wif_issuer)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.wif_client.as_str()),
                ("client_secret", self.wif_secret.as_str()),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("scope", "openid"),
            ])
            .send()
            .await
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?
            .error_for_status()
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?;
        Ok(response.access_token)
    }

    /// Acquire one token eagerly, used as a fail-fast construction check (spec §4.3).
    pub async fn probe(&self) -> Result<(), GitError> {
        self.token().await.map(|_| ())
    }
}

#[async_trait]
impl TokenProvider for MiWifTokenProvider {
    async fn token(&self) -> Result<String, GitError> {
        {
            let guard = self.cached_token.lock().await;
            if let Some(cached) = guard.as_ref() {
                if cached.valid_past_skew() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut guard = self.cached_token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.valid_past_skew() {
                return Ok(cached.token.clone());
            }
        }

        let assertion = self.federated_token().await?;
        debug!(tenant = %self.tenant_id, mi_id = %self.mi_id, "acquiring MI-WIF token");
        let response = self
            .http
            .post(format!(
                "{}/{}/oauth2/v2.0/token",
                self.token_endpoint_base, self.tenant_id
            ))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.mi_id.as_str()),
                (
                    "client_assertion_type",
                    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
                ),
                ("client_assertion", assertion.as_str()),
                ("scope", AZURE_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?
            .error_for_status()
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| GitError::TokenAcquisition(e.to_string()))?;

        let cached = CachedToken {
            token: response.access_token.clone(),
            expires_at: SystemTime::now() + Duration::from_secs(response.expires_in),
        };
        *guard = Some(cached.clone());
        Ok(cached.token)
    }
}
