// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use chub_aggregator::Aggregator;
use chub_config::{JsonCredentialFetcher, ServerConfig};
use chub_credhub::CredhubSource;
use chub_domain::{SourceDescriptor, Source};
use chub_git::{CredentialRegistry, GitSource};
use chub_server::{AppState, StoreAdapter};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// config-hub: a Spring-Cloud-Config-compatible property aggregation server
/// (spec §1, §6).
#[derive(Parser, Debug)]
#[command(name = "chub-server", version, about = "Config aggregation server")]
struct Args {
    /// Enable verbose (`debug`) logging regardless of `LOG_LEVEL`.
    #[arg(long)]
    debug: bool,
}

/// `CREDHUB_API`/`CREDHUB_UAA`/`CREDHUB_CLIENT`/`CREDHUB_SECRET`: the
/// ambient bootstrap credentials used to resolve `CREDHUB-REF` and any
/// `azSecret-credhub-ref`/`credhub` source. CF service-binding
/// auto-discovery is out of scope here — the secret store client itself is
/// an opaque external dependency, so these are read directly from the
/// environment instead.
fn bootstrap_store_client() -> Option<Arc<chub_credhub::HttpSecretStoreClient>> {
    let api = std::env::var("CREDHUB_API").ok()?;
    let uaa = std::env::var("CREDHUB_UAA").ok()?;
    let client = std::env::var("CREDHUB_CLIENT").ok()?;
    let secret = std::env::var("CREDHUB_SECRET").ok()?;
    Some(Arc::new(chub_credhub::HttpSecretStoreClient::new(
        api, uaa, client, secret,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let argv: Vec<String> = std::env::args().collect();

    // Dual-mode dispatch: no args starts the server; `credentials
    // <repoPath> <action>` runs the git credential-helper callback as a
    // short-lived child process instead.
    if argv.len() >= 4 && argv[1] == "credentials" {
        let stdin = io::stdin();
        let registry = build_credential_registry().await?;
        let code = chub_server::credentials::run(&registry, &argv[2], &argv[3], stdin.lock());
        std::process::exit(code);
    }

    // Anything else (including `--help`/`--version`, or an unrecognized
    // first argument) falls through to clap's own usage banner and exit
    // behavior.
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("chub_server=debug,chub_git=debug,chub_credhub=debug,chub_aggregator=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bootstrap = bootstrap_store_client();
    let fetcher: Option<Arc<dyn JsonCredentialFetcher>> =
        bootstrap.clone().map(|c| Arc::new(StoreAdapter(c)) as Arc<dyn JsonCredentialFetcher>);
    let config = chub_config::load(fetcher.as_deref()).await.context("load configuration")?;

    let state = build_state(&config, bootstrap).await?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("bind port {}", config.port))?;
    tracing::info!(port = config.port, sources = state.aggregator.sources().len(), "config-hub listening");

    let app = chub_server::build_app(Arc::new(state));
    axum::serve(listener, app).await.context("serve")
}

/// Builds just the credential registry the `credentials` subcommand needs,
/// without cloning any repository: a full `GitSource::new` would shell out
/// to git for every configured source just to answer one credential
/// lookup, which is wasteful for what's meant to be a fast helper call
/// (the gap the Go original closed by calling back into an already-running
/// server instead — see the `chub-git` deviation note in `DESIGN.md`).
async fn build_credential_registry() -> Result<CredentialRegistry> {
    let bootstrap = bootstrap_store_client();
    let fetcher: Option<Arc<dyn JsonCredentialFetcher>> =
        bootstrap.clone().map(|c| Arc::new(StoreAdapter(c)) as Arc<dyn JsonCredentialFetcher>);
    let config = chub_config::load(fetcher.as_deref()).await.context("load configuration")?;

    let mut registry = CredentialRegistry::new();
    for descriptor in config.sources {
        if let SourceDescriptor::Git(git_descriptor) = descriptor {
            if let Ok(validated) = chub_git::validate(git_descriptor) {
                if matches!(validated.auth, chub_git::AuthMethod::UsernamePassword { .. }) {
                    registry.register(validated.descriptor);
                }
            }
        }
    }
    Ok(registry)
}

fn bootstrap_secret_fetcher(
    bootstrap: &Option<Arc<chub_credhub::HttpSecretStoreClient>>,
) -> Option<Arc<dyn chub_git::CredhubSecretFetcher>> {
    let client = bootstrap.clone()?;
    Some(Arc::new(StoreAdapter(client)) as Arc<dyn chub_git::CredhubSecretFetcher>)
}

/// Constructs every configured `GitSource`/`CredhubSource`, wiring the
/// credhub secret-fetcher seam (`az_secret_credhub_ref`, and the `credhub`
/// source's own store client) from either the bootstrap client or, when
/// present, the descriptor's own `client`/`secret` override (spec §4.1,
/// §4.6 "Source Construction").
async fn build_state(
    config: &ServerConfig,
    bootstrap: Option<Arc<chub_credhub::HttpSecretStoreClient>>,
) -> Result<AppState> {
    let self_exe = std::env::current_exe().context("resolve own executable path")?;
    let base_dir = std::path::PathBuf::from(
        std::env::var("CH_REPO_BASE_DIR").unwrap_or_else(|_| "/tmp/config-hub".to_string()),
    );
    tokio::fs::create_dir_all(&base_dir)
        .await
        .with_context(|| format!("create repo base dir {}", base_dir.display()))?;

    let secret_fetcher = bootstrap_secret_fetcher(&bootstrap);

    let mut registry = CredentialRegistry::new();
    let mut sources: Vec<Arc<dyn Source>> = Vec::new();
    let mut credhub: Option<Arc<CredhubSource>> = None;

    for (index, descriptor) in config.sources.clone().into_iter().enumerate() {
        match descriptor {
            SourceDescriptor::Git(git_descriptor) => {
                let source = GitSource::new(
                    index,
                    &base_dir,
                    &self_exe,
                    git_descriptor,
                    secret_fetcher.clone(),
                    &mut registry,
                )
                .await
                .with_context(|| format!("construct git source #{index}"))?;
                sources.push(Arc::new(source));
            }
            SourceDescriptor::Credhub(credhub_descriptor) => {
                let client: Arc<dyn chub_credhub::SecretStoreClient> =
                    match (&credhub_descriptor.client, &credhub_descriptor.secret, &bootstrap) {
                        (Some(client_id), Some(secret), _) => Arc::new(
                            build_store_client(client_id.clone(), secret.clone())?,
                        ),
                        (_, _, Some(shared)) => shared.clone(),
                        _ => anyhow::bail!(
                            "credhub source #{index} has no client/secret and no bootstrap store client is configured"
                        ),
                    };
                let source = Arc::new(
                    CredhubSource::new(&credhub_descriptor.prefix, client)
                        .with_context(|| format!("construct credhub source #{index}"))?,
                );
                credhub = Some(source.clone());
                sources.push(source as Arc<dyn Source>);
            }
        }
    }

    Ok(AppState {
        aggregator: Arc::new(Aggregator::new(sources)),
        credhub,
        credentials: Arc::new(registry),
    })
}

fn build_store_client(client: String, secret: String) -> Result<chub_credhub::HttpSecretStoreClient> {
    let api = std::env::var("CREDHUB_API").context("CREDHUB_API is required for a credhub source")?;
    let uaa = std::env::var("CREDHUB_UAA").context("CREDHUB_UAA is required for a credhub source")?;
    Ok(chub_credhub::HttpSecretStoreClient::new(api, uaa, client, secret))
}
