use std::sync::Arc;

use chub_aggregator::Aggregator;
use chub_credhub::CredhubSource;
use chub_git::CredentialRegistry;

/// Shared state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Fan-out over every configured source.
    pub aggregator: Arc<Aggregator>,
    /// The process's singleton credhub source, if one was configured.
    ///
    /// The secrets endpoints (§4.7) are only meaningful when a credhub
    /// source is present; absent it they reply `501 Not Implemented`.
    pub credhub: Option<Arc<CredhubSource>>,
    /// Process-wide git-credential lookup populated once at startup (§5).
    pub credentials: Arc<CredentialRegistry>,
}
