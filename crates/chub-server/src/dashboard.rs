use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct SourceReport {
    source: String,
    report: Option<String>,
}

/// `GET /dashboard`: per-source diagnostic reports (spec §4.2 `Branches`,
/// `sources/dashboard.go`). The original renders a literal placeholder
/// string ("Soon to be dashboard!"); a real dashboard UI is out of scope
/// here too, so this stays a plain JSON summary rather than growing a
/// template layer.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut reports = Vec::new();
    for source in state.aggregator.sources() {
        reports.push(SourceReport {
            source: source.name(),
            report: source.dashboard_report().await,
        });
    }
    Json(reports)
}
