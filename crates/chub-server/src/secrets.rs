use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

use crate::errors::ApiError;
use crate::state::AppState;

/// `apps`/`profiles`/`labels` query parameters shared by every secrets
/// endpoint: comma-separated, absent means "no filter" (an empty `Vec`,
/// which `CredhubSource` defaults internally per §4.7).
fn list_param(params: &HashMap<String, String>, name: &str) -> Vec<String> {
    params
        .get(name)
        .map(|v| v.split(',').map(String::from).collect())
        .unwrap_or_default()
}

fn require_credhub(state: &AppState) -> Result<&chub_credhub::CredhubSource, ApiError> {
    state.credhub.as_deref().ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_IMPLEMENTED,
            "no credhub source is configured",
        )
    })
}

/// `POST /secrets` and `POST /secrets/add` (§4.7 `AddSecrets`).
///
/// The body is the raw JSON object to merge, with no enclosing envelope.
pub async fn add_secrets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    Json(payload): Json<BTreeMap<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let credhub = require_credhub(&state)?;
    let apps = list_param(&params, "apps");
    let profiles = list_param(&params, "profiles");
    let labels = list_param(&params, "labels");
    credhub.add_secrets(&apps, &profiles, &labels, &payload).await?;
    Ok(StatusCode::ACCEPTED)
}

/// `DELETE /secrets` and `DELETE /secrets/delete` (§4.7 `DeleteSecrets`).
///
/// The body is a bare JSON array of dotted keys (§9 open question
/// resolution) — there is no established convention for this shape, since
/// no prior art defines the delete request body.
pub async fn delete_secrets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    Json(dotted_keys): Json<Vec<String>>,
) -> Result<impl IntoResponse, ApiError> {
    let credhub = require_credhub(&state)?;
    let apps = list_param(&params, "apps");
    let profiles = list_param(&params, "profiles");
    let labels = list_param(&params, "labels");
    credhub
        .delete_secrets(&apps, &profiles, &labels, &dotted_keys)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// `GET /secrets/list` — config-server-compatible flattened view.
pub async fn list_secrets_compatible(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let credhub = require_credhub(&state)?;
    let apps = list_param(&params, "apps");
    let profiles = list_param(&params, "profiles");
    let labels = list_param(&params, "labels");
    let names = credhub.list_secrets_compatible(&apps, &profiles, &labels).await?;
    Ok(Json(names))
}

/// `GET /secrets` — the 3-level nested view.
pub async fn list_secrets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let credhub = require_credhub(&state)?;
    let apps = list_param(&params, "apps");
    let profiles = list_param(&params, "profiles");
    let labels = list_param(&params, "labels");
    let nested = credhub.list_secrets(&apps, &profiles, &labels).await?;
    Ok(Json(nested))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_param_splits_on_comma() {
        let mut params = HashMap::new();
        params.insert("apps".to_string(), "a,b,c".to_string());
        assert_eq!(list_param(&params, "apps"), vec!["a", "b", "c"]);
    }

    #[test]
    fn list_param_absent_is_empty() {
        let params = HashMap::new();
        assert!(list_param(&params, "apps").is_empty());
    }
}
