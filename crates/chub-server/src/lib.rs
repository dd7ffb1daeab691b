// SPDX-License-Identifier: MIT OR Apache-2.0
//! The HTTP boundary and startup wiring for config-hub (§6, component H's
//! callers).
//!
//! This crate is the external collaborator: the axum router, the git
//! credential-helper subcommand, and `main`'s source construction. The
//! aggregation invariants live in `chub-aggregator` and below; this crate
//! only wires them up to a network listener.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapters;
pub mod credentials;
mod dashboard;
mod errors;
mod properties;
mod secrets;
mod state;

pub use adapters::StoreAdapter;
pub use errors::ApiError;
pub use state::AppState;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

/// Build the axum router over every route spec §6 names.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/credentials", axum::routing::post(credentials::serve_credentials))
        .route(
            "/secrets",
            get(secrets::list_secrets)
                .post(secrets::add_secrets)
                .delete(secrets::delete_secrets),
        )
        .route("/secrets/add", axum::routing::post(secrets::add_secrets))
        .route("/secrets/delete", axum::routing::delete(secrets::delete_secrets))
        .route("/secrets/list", get(secrets::list_secrets_compatible))
        .route("/{app}/{profiles}", get(properties::get_properties))
        .route(
            "/{app}/{profiles}/{label}",
            get(properties::get_properties_with_label),
        )
        .route("/{app_profiles_ext}", get(properties::get_properties_map))
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
