use async_trait::async_trait;
use chub_domain::SourceDescriptor;

use crate::error::ConfigError;
use crate::sources::{parse_sources, validate_sources};

/// Port the original's `cfg.Port` defaulted to.
pub const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CF_URL: &str = "https://api.cf.internal";

/// Resolves a named credhub credential's JSON value.
///
/// Used only to resolve `CREDHUB-REF` at startup; `chub-server` wires this
/// to the same `chub_credhub::SecretStoreClient` the credhub source uses,
/// the same small-seam-trait pattern `chub-git`'s `CredhubSecretFetcher`
/// uses for `azSecret-credhub-ref`.
#[async_trait]
pub trait JsonCredentialFetcher: Send + Sync {
    /// Fetch the named credential's JSON value.
    async fn get_json_by_name(&self, name: &str) -> Result<serde_json::Value, String>;
}

/// Fully resolved startup configuration (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// HTTP listen port (`PORT`, default [`DEFAULT_PORT`]).
    pub port: u16,
    /// `tracing` filter level (`LOG_LEVEL`, default `"info"`).
    pub log_level: String,
    /// Cloud Foundry API URL, from `VCAP_APPLICATION.cf_api` or `CF_URL`.
    pub cf_url: String,
    /// Parsed and validated source descriptors.
    pub sources: Vec<SourceDescriptor>,
    /// UAA client id, present only when sourced via `CREDHUB-REF`.
    pub uaa_client: Option<String>,
    /// UAA client secret, present only when sourced via `CREDHUB-REF`.
    pub uaa_secret: Option<String>,
}

/// Load [`ServerConfig`] from the process environment.
///
/// `fetcher` resolves `CREDHUB-REF`; pass `None` when only `CH_SOURCES` is
/// supported (e.g. in a deployment with no store client configured — any
/// `CREDHUB-REF` present then fails validation rather than panicking).
pub async fn load(fetcher: Option<&dyn JsonCredentialFetcher>) -> Result<ServerConfig, ConfigError> {
    load_from(&EnvLookup, fetcher).await
}

/// Abstraction over variable lookup, so tests never touch the real process
/// environment (which is global, mutable, and shared across test threads).
pub trait VarLookup {
    /// Look up a variable by name.
    fn get(&self, name: &str) -> Option<String>;
}

struct EnvLookup;

impl VarLookup for EnvLookup {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Testable entry point: [`load`] with the environment replaced by `vars`.
pub async fn load_from(
    vars: &dyn VarLookup,
    fetcher: Option<&dyn JsonCredentialFetcher>,
) -> Result<ServerConfig, ConfigError> {
    let mut reasons = Vec::new();

    let port = match vars.get("PORT") {
        Some(raw) => match raw.parse::<u16>() {
            Ok(p) => p,
            Err(_) => {
                reasons.push(format!("PORT is not a valid port number: {raw}"));
                DEFAULT_PORT
            }
        },
        None => DEFAULT_PORT,
    };

    let log_level = vars.get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
    let cf_url = resolve_cf_url(vars, &mut reasons);
    let (sources, uaa_client, uaa_secret) =
        resolve_sources(vars, fetcher, &mut reasons).await;

    if !reasons.is_empty() {
        return Err(ConfigError::Validation(reasons));
    }
    validate_sources(&sources)?;

    Ok(ServerConfig {
        port,
        log_level,
        cf_url,
        sources,
        uaa_client,
        uaa_secret,
    })
}

fn resolve_cf_url(vars: &dyn VarLookup, reasons: &mut Vec<String>) -> String {
    if let Some(vcap) = vars.get("VCAP_APPLICATION") {
        match serde_json::from_str::<serde_json::Value>(&vcap) {
            Ok(v) => v
                .get("cf_api")
                .and_then(|x| x.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_CF_URL.to_string()),
            Err(e) => {
                reasons.push(format!("unable to parse VCAP_APPLICATION: {e}"));
                DEFAULT_CF_URL.to_string()
            }
        }
    } else {
        vars.get("CF_URL").unwrap_or_else(|| DEFAULT_CF_URL.to_string())
    }
}

async fn resolve_sources(
    vars: &dyn VarLookup,
    fetcher: Option<&dyn JsonCredentialFetcher>,
    reasons: &mut Vec<String>,
) -> (Vec<SourceDescriptor>, Option<String>, Option<String>) {
    if let Some(credhub_ref) = vars.get("CREDHUB-REF") {
        let Some(fetcher) = fetcher else {
            reasons.push("CREDHUB-REF is set but no credential fetcher is configured".to_string());
            return (Vec::new(), None, None);
        };
        match fetcher.get_json_by_name(&credhub_ref).await {
            Ok(value) => {
                let uaa_client = value.get("uaa_client").and_then(|v| v.as_str()).map(String::from);
                let uaa_secret = value.get("uaa_secret").and_then(|v| v.as_str()).map(String::from);
                if uaa_client.is_none() {
                    reasons.push("uaa_client is not a string".to_string());
                }
                if uaa_secret.is_none() {
                    reasons.push("uaa_secret is not a string".to_string());
                }
                let sources = match value.get("sources").and_then(|v| v.as_str()) {
                    Some(blob) => match parse_sources(blob) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            reasons.push(e.to_string());
                            Vec::new()
                        }
                    },
                    None => {
                        reasons.push("sources is not a string".to_string());
                        Vec::new()
                    }
                };
                (sources, uaa_client, uaa_secret)
            }
            Err(e) => {
                reasons.push(format!(
                    "unable to retrieve credhub credentials from {credhub_ref}: {e}"
                ));
                (Vec::new(), None, None)
            }
        }
    } else if let Some(blob) = vars.get("CH_SOURCES") {
        match parse_sources(&blob) {
            Ok(parsed) => (parsed, None, None),
            Err(e) => {
                reasons.push(e.to_string());
                (Vec::new(), None, None)
            }
        }
    } else {
        reasons.push("no sources provided (set CH_SOURCES or CREDHUB-REF)".to_string());
        (Vec::new(), None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct MapLookup(BTreeMap<&'static str, String>);

    impl VarLookup for MapLookup {
        fn get(&self, name: &str) -> Option<String> {
            self.0.get(name).cloned()
        }
    }

    struct FakeFetcher(serde_json::Value);

    #[async_trait]
    impl JsonCredentialFetcher for FakeFetcher {
        async fn get_json_by_name(&self, _name: &str) -> Result<serde_json::Value, String> {
            Ok(self.0.clone())
        }
    }

    fn ch_sources_only(blob: &str) -> MapLookup {
        MapLookup(BTreeMap::from([("CH_SOURCES", blob.to_string())]))
    }

    #[tokio::test]
    async fn loads_from_ch_sources_with_defaults() {
        let vars = ch_sources_only(r#"[{"type":"git","uri":"https://example.com/repo.git"}]"#);
        let cfg = load_from(&vars, None).await.unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.cf_url, DEFAULT_CF_URL);
        assert_eq!(cfg.sources.len(), 1);
        assert!(cfg.uaa_client.is_none());
    }

    #[tokio::test]
    async fn port_and_log_level_overrides_apply() {
        let mut map = BTreeMap::from([(
            "CH_SOURCES",
            r#"[{"type":"git","uri":"https://example.com/repo.git"}]"#.to_string(),
        )]);
        map.insert("PORT", "9090".to_string());
        map.insert("LOG_LEVEL", "debug".to_string());
        let cfg = load_from(&MapLookup(map), None).await.unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.log_level, "debug");
    }

    #[tokio::test]
    async fn invalid_port_is_an_aggregated_validation_error() {
        let mut map = BTreeMap::from([(
            "CH_SOURCES",
            r#"[{"type":"git","uri":"https://example.com/repo.git"}]"#.to_string(),
        )]);
        map.insert("PORT", "not-a-port".to_string());
        let err = load_from(&MapLookup(map), None).await.unwrap_err();
        match err {
            ConfigError::Validation(reasons) => {
                assert!(reasons.iter().any(|r| r.contains("PORT")));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_sources_is_an_error() {
        let err = load_from(&MapLookup(BTreeMap::new()), None).await.unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[tokio::test]
    async fn cf_url_from_vcap_application() {
        let mut map = BTreeMap::from([(
            "CH_SOURCES",
            r#"[{"type":"git","uri":"https://example.com/repo.git"}]"#.to_string(),
        )]);
        map.insert(
            "VCAP_APPLICATION",
            r#"{"cf_api": "https://api.example.com"}"#.to_string(),
        );
        let cfg = load_from(&MapLookup(map), None).await.unwrap();
        assert_eq!(cfg.cf_url, "https://api.example.com");
    }

    #[tokio::test]
    async fn credhub_ref_resolves_sources_and_uaa_credentials() {
        let map = BTreeMap::from([("CREDHUB-REF", "my-bootstrap-ref".to_string())]);
        let fetcher = FakeFetcher(serde_json::json!({
            "uaa_client": "client",
            "uaa_secret": "secret",
            "sources": r#"[{"type":"credhub","prefix":"myapp"}]"#,
        }));
        let cfg = load_from(&MapLookup(map), Some(&fetcher)).await.unwrap();
        assert_eq!(cfg.uaa_client.as_deref(), Some("client"));
        assert_eq!(cfg.uaa_secret.as_deref(), Some("secret"));
        assert_eq!(cfg.sources.len(), 1);
    }

    #[tokio::test]
    async fn credhub_ref_without_fetcher_is_an_error() {
        let map = BTreeMap::from([("CREDHUB-REF", "my-bootstrap-ref".to_string())]);
        let err = load_from(&MapLookup(map), None).await.unwrap_err();
        match err {
            ConfigError::Validation(reasons) => {
                assert!(reasons.iter().any(|r| r.contains("no credential fetcher")));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn credhub_ref_missing_sources_field_is_an_error() {
        let map = BTreeMap::from([("CREDHUB-REF", "my-bootstrap-ref".to_string())]);
        let fetcher = FakeFetcher(serde_json::json!({
            "uaa_client": "client",
            "uaa_secret": "secret",
        }));
        let err = load_from(&MapLookup(map), Some(&fetcher)).await.unwrap_err();
        match err {
            ConfigError::Validation(reasons) => {
                assert!(reasons.iter().any(|r| r.contains("sources is not a string")));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
