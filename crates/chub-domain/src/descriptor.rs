use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Minimum fetch-cache TTL in seconds; descriptor values below this are
/// coerced up to it (spec §4.5).
pub const MIN_FETCH_CACHE_TTL: u64 = 60;

/// A configured backing source, as deserialized from the `CH_SOURCES` JSON
/// blob (spec §6, "Source Descriptor JSON").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceDescriptor {
    /// A git-backed source.
    Git(GitDescriptor),
    /// A credhub-backed source.
    Credhub(CredhubDescriptor),
}

/// Raw JSON shape for a git source descriptor.
///
/// Field names match the wire contract in spec §6 verbatim; validation into
/// a resolved auth method and a normalized TTL happens in `chub-git`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitDescriptor {
    /// Remote repository URI.
    pub uri: String,

    /// Disables `--depth=1` shallow clone/fetch when `true`.
    #[serde(default)]
    pub deep_clone: bool,

    /// Default git ref used when a request does not specify a label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_label: Option<String>,

    /// Search path patterns, may contain `{application}`, `{profile}`, `*`.
    #[serde(default)]
    pub search_paths: Vec<String>,

    /// Passed through to the git child process.
    #[serde(default)]
    pub skip_ssl_validation: bool,

    /// Escalates a fetch failure to a hard request-aborting error.
    #[serde(default)]
    pub fail_on_fetch: bool,

    /// Fetch cache TTL in seconds; values below [`MIN_FETCH_CACHE_TTL`] are
    /// coerced up to it. `None` also resolves to the minimum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_cache_ttl: Option<u64>,

    /// Username for username/password auth (also used by the git
    /// credential-helper callback).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for username/password auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// SSH private key auth. Declared but rejected (spec §9 open question).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    /// Azure AD tenant id, shared by the SPN and MI-WIF auth shapes.
    #[serde(rename = "azTenantId", default, skip_serializing_if = "Option::is_none")]
    pub az_tenant_id: Option<String>,
    /// SPN client id.
    #[serde(rename = "azClient", default, skip_serializing_if = "Option::is_none")]
    pub az_client: Option<String>,
    /// SPN client secret, given directly.
    #[serde(rename = "azSecret", default, skip_serializing_if = "Option::is_none")]
    pub az_secret: Option<String>,
    /// SPN client secret, fetched from credhub by reference.
    #[serde(
        rename = "azSecret-credhub-ref",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub az_secret_credhub_ref: Option<String>,
    /// Credhub client name used to fetch `azSecret-credhub-ref`.
    #[serde(
        rename = "azSecret-credhub-client",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub az_secret_credhub_client: Option<String>,
    /// Credhub client secret used to fetch `azSecret-credhub-ref`.
    #[serde(
        rename = "azSecret-credhub-secret",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub az_secret_credhub_secret: Option<String>,

    /// Managed-identity id for MI-WIF auth.
    #[serde(rename = "azMiId", default, skip_serializing_if = "Option::is_none")]
    pub az_mi_id: Option<String>,
    /// Federated-token issuer URL for MI-WIF auth.
    #[serde(
        rename = "azMiWifIssuer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub az_mi_wif_issuer: Option<String>,
    /// Federated-token client id for MI-WIF auth.
    #[serde(
        rename = "azMiWifClient",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub az_mi_wif_client: Option<String>,
    /// Federated-token client secret for MI-WIF auth.
    #[serde(
        rename = "azMiWifSecret",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub az_mi_wif_secret: Option<String>,
}

/// Raw JSON shape for a credhub source descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredhubDescriptor {
    /// Namespace prefix; normalized to begin and end with `/` by `chub-credhub`.
    pub prefix: String,

    /// Store client name, paired with `secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Store client secret, paired with `client`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}
