use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chub_domain::{GitDescriptor, PropertySource, Source};
use chub_error::ChubError;
use chub_properties::{parse_key_value, parse_nested_document};
use tokio::sync::RwLock;
use tracing::error;

use crate::auth::{validate, AuthMethod};
use crate::discovery::{discover, locate_import};
use crate::error::GitError;
use crate::repository::{repo_path_fragment, AuthInjection, Repository};
use crate::token::{CredhubSecretFetcher, MiWifTokenProvider, SpnTokenProvider, TokenProvider};

const DEFAULT_DEFAULT_LABEL: &str = "master";
const PROMOTED_DEFAULT_LABEL: &str = "main";

/// The git-backed property source (spec §4.5, component E).
pub struct GitSource {
    uri: String,
    search_paths: Vec<String>,
    repo: Repository,
    default_label: RwLock<String>,
    call_lock: tokio::sync::Mutex<()>,
}

impl GitSource {
    /// Validate `descriptor`, initialize its working tree under
    /// `base_dir/config-repo-<index>`, and construct the resolved auth
    /// method's token provider.
    ///
    /// `secret_fetcher` resolves `azSecret-credhub-ref`; `chub-server` wires
    /// it to the same store client `chub-credhub` uses. `credential_helper`
    /// receives the descriptor so the process-wide callback map (§5) can be
    /// populated before any request is served.
    pub async fn new(
        index: usize,
        process_base_dir: &Path,
        self_exe: &Path,
        descriptor: GitDescriptor,
        secret_fetcher: Option<Arc<dyn CredhubSecretFetcher>>,
        credential_helper: &mut crate::credential_helper::CredentialRegistry,
    ) -> Result<Self, GitError> {
        let validated = validate(descriptor)?;
        let uri = validated.descriptor.uri.clone();
        let search_paths = validated.descriptor.search_paths.clone();
        let default_label = validated
            .descriptor
            .default_label
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_DEFAULT_LABEL.to_string());

        let base_dir = process_base_dir.join(format!("config-repo-{index}"));

        let (auth, credential_helper_command) = match &validated.auth {
            AuthMethod::UsernamePassword { .. } => {
                let fragment = repo_path_fragment(&uri);
                let command = format!("{} credentials {}", self_exe.display(), fragment);
                (None, Some(command))
            }
            AuthMethod::AzSpn {
                tenant_id,
                client_id,
                secret,
                credhub_ref,
                ..
            } => {
                let provider = SpnTokenProvider::new(
                    tenant_id.clone(),
                    client_id.clone(),
                    secret.clone(),
                    credhub_ref.clone(),
                    secret_fetcher,
                );
                (
                    Some(AuthInjection {
                        env_name: "SPN_TOKEN",
                        provider: Arc::new(provider) as Arc<dyn TokenProvider>,
                    }),
                    None,
                )
            }
            AuthMethod::AzMiWif {
                tenant_id,
                mi_id,
                wif_issuer,
                wif_client,
                wif_secret,
                username,
                password,
            } => {
                let provider = MiWifTokenProvider::new(
                    tenant_id.clone(),
                    mi_id.clone(),
                    wif_issuer.clone(),
                    wif_client.clone(),
                    wif_secret.clone(),
                    username.clone(),
                    password.clone(),
                );
                provider.probe().await?;
                (
                    Some(AuthInjection {
                        env_name: "MIWIF_TOKEN",
                        provider: Arc::new(provider) as Arc<dyn TokenProvider>,
                    }),
                    None,
                )
            }
            AuthMethod::Anonymous | AuthMethod::PrivateKey => (None, None),
        };

        if matches!(validated.auth, AuthMethod::UsernamePassword { .. }) {
            credential_helper.register(validated.descriptor.clone());
        }

        let repo = Repository::init(
            base_dir,
            &uri,
            !validated.descriptor.deep_clone,
            validated.descriptor.fail_on_fetch,
            std::time::Duration::from_secs(validated.fetch_cache_ttl_secs),
            auth,
            credential_helper_command,
        )
        .await?;

        Ok(Self {
            uri,
            search_paths,
            repo,
            default_label: RwLock::new(default_label),
            call_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn resolve_label(&self, requested_label: Option<&str>) -> Result<String, GitError> {
        let current_default = self.default_label.read().await.clone();
        let label = requested_label
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or(current_default);

        match self.repo.refresh(&label).await {
            Ok(()) => Ok(label),
            Err(e) if label == DEFAULT_DEFAULT_LABEL => {
                self.repo.refresh(PROMOTED_DEFAULT_LABEL).await?;
                *self.default_label.write().await = PROMOTED_DEFAULT_LABEL.to_string();
                let _ = e;
                Ok(PROMOTED_DEFAULT_LABEL.to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn read_and_parse(path: &PathBuf) -> Result<std::collections::BTreeMap<String, serde_json::Value>, GitError> {
        let content = std::fs::read_to_string(path).map_err(|e| GitError::ParseFailure {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
        if path.extension().and_then(|e| e.to_str()) == Some("properties") {
            Ok(parse_key_value(&content))
        } else {
            parse_nested_document(&content).map_err(|e| GitError::ParseFailure {
                path: path.display().to_string(),
                cause: e.to_string(),
            })
        }
    }
}

#[async_trait]
impl Source for GitSource {
    fn name(&self) -> String {
        self.uri.clone()
    }

    async fn find_properties(
        &self,
        apps: &[String],
        profiles: &[String],
        label: Option<&str>,
    ) -> Result<Vec<PropertySource>, ChubError> {
        let _guard = self.call_lock.lock().await;

        let resolved_label = self.resolve_label(label).await.map_err(ChubError::from)?;

        let files = discover(self.repo.base_dir(), &self.search_paths, apps, profiles);

        let mut layers = Vec::new();
        for file in &files {
            match Self::read_and_parse(file) {
                Ok(properties) => layers.push(PropertySource {
                    source: file.display().to_string(),
                    properties,
                }),
                Err(e) => error!("skipping {}: {e}", file.display()),
            }
        }

        let primary_app = apps.first().map(String::as_str).unwrap_or("application");
        let primary_profile = profiles.first().map(String::as_str).unwrap_or("default");

        let mut imports = Vec::new();
        for layer in &layers {
            let Some(import_name) = layer.properties.get("spring.config.import").and_then(|v| v.as_str()) else {
                continue;
            };
            if let Some(path) = locate_import(
                self.repo.base_dir(),
                &self.search_paths,
                primary_app,
                primary_profile,
                import_name,
            ) {
                match Self::read_and_parse(&path) {
                    Ok(properties) => imports.push(PropertySource {
                        source: path.display().to_string(),
                        properties,
                    }),
                    Err(e) => error!("skipping import {}: {e}", path.display()),
                }
            }
        }
        layers.extend(imports);

        let _ = resolved_label;
        Ok(layers)
    }

    async fn dashboard_report(&self) -> Option<String> {
        let local = self.repo.branches(false).await.ok()?;
        let remote = self.repo.branches(true).await.ok()?;
        let mut report = format!("repository: {}\n", self.uri);
        report.push_str("local branches:\n");
        for branch in local {
            report.push_str(&format!("  {} {} {}\n", branch.commit_id, branch.date, branch.name));
        }
        report.push_str("remote branches:\n");
        for branch in remote {
            report.push_str(&format!("  {} {} {}\n", branch.commit_id, branch.date, branch.name));
        }
        Some(report)
    }
}
