use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chub_domain::Response as ConfigResponse;
use serde_json::Value;
use tracing::debug;

use crate::errors::ApiError;
use crate::state::AppState;

/// `GET /{app}/{profiles}` (spec §6).
pub async fn get_properties(
    State(state): State<Arc<AppState>>,
    Path((app, profiles)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    respond(&state, app, profiles, None).await
}

/// `GET /{app}/{profiles}/{label}` (spec §6); `label` may encode `/` as `(_)`.
pub async fn get_properties_with_label(
    State(state): State<Arc<AppState>>,
    Path((app, profiles, label)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let label = label.replace("(_)", "/");
    respond(&state, app, profiles, Some(label)).await
}

async fn respond(
    state: &AppState,
    app: String,
    profiles: String,
    label: Option<String>,
) -> Result<Response, ApiError> {
    let profile_list: Vec<String> = profiles.split(',').map(String::from).collect();
    debug!(app = %app, profiles = %profiles, label = ?label, "properties request");

    let layers = state
        .aggregator
        .find_properties(&app, &profile_list, label.as_deref())
        .await;

    if layers.is_empty() {
        return Err(ApiError::not_found("no properties found"));
    }

    let mut response = ConfigResponse::new(app, profile_list, label);
    response.property_sources = layers;
    Ok(Json(response).into_response())
}

/// Recognized format-specific serializations (§6 "`.{json|yml|yaml|properties}`").
const EXTENSIONS: [&str; 4] = ["json", "yml", "yaml", "properties"];

/// `GET /{appProfiles}.{json|yml|yaml|properties}` (§6): a single merged
/// property map. `appProfiles` parses as `<app>-<profileList>` with
/// `profileList` comma-separated; there is no established convention for
/// the `<app>-<profileList>` split point, so it is resolved pragmatically
/// at the first `-`.
pub async fn get_properties_map(
    State(state): State<Arc<AppState>>,
    Path(app_profiles_ext): Path<String>,
) -> Result<Response, ApiError> {
    let Some((stem, ext)) = app_profiles_ext.rsplit_once('.') else {
        return Err(ApiError::not_found("missing format extension"));
    };
    if !EXTENSIONS.contains(&ext) {
        return Err(ApiError::not_found(format!("unsupported format: {ext}")));
    }
    let Some((app, profile_list)) = stem.split_once('-') else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "expected <app>-<profileList>",
        ));
    };
    let profiles: Vec<String> = profile_list.split(',').map(String::from).collect();

    debug!(app = %app, profiles = %profile_list, ext = %ext, "merged properties request");

    let merged = state.aggregator.find_properties_map(app, &profiles, None).await;
    let flattened = chub_properties::flatten_properties(&merged);

    Ok(match ext {
        "json" => Json(flattened).into_response(),
        "yml" | "yaml" => {
            let body = serde_yaml_ng::to_string(&flattened)
                .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            (
                [("content-type", "application/yaml")],
                body,
            )
                .into_response()
        }
        "properties" => (
            [("content-type", "text/plain")],
            render_properties(&flattened),
        )
            .into_response(),
        _ => unreachable!("filtered by EXTENSIONS above"),
    })
}

fn render_properties(flattened: &BTreeMap<String, Value>) -> String {
    let mut out = String::new();
    for (key, value) in flattened {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(key);
        out.push('=');
        out.push_str(&rendered);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_string_values_without_quotes() {
        let mut map = BTreeMap::new();
        map.insert("a.b".to_string(), Value::String("x".to_string()));
        map.insert("a.c".to_string(), Value::from(9));
        assert_eq!(render_properties(&map), "a.b=x\na.c=9\n");
    }
}
