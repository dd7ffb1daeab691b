use std::io::BufRead;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chub_git::CredentialRegistry;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequestBody {
    pub protocol: String,
    pub host: String,
    pub repo: String,
}

#[derive(Debug, Serialize)]
pub struct HttpCredentials {
    pub username: String,
    pub password: String,
}

/// `POST /credentials` (§6): the git credential-helper callback served
/// over HTTP, for completeness of the documented contract — the
/// `credentials` child-process subcommand (`cli.rs`) looks the registry up
/// in-process directly and does not call this endpoint itself.
pub async fn serve_credentials(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    match state
        .credentials
        .lookup(&request.protocol, &request.host, &request.repo)
    {
        Some((username, password)) => Ok(Json(HttpCredentials { username, password })),
        None => Err(ApiError::not_found("no credentials configured for this repository")),
    }
}

/// The `<self> credentials <repoPath> <action>` subcommand (§6).
///
/// Reads `key=value` lines from `stdin`, and for `get` writes
/// `protocol=…`/`host=…`/`username=…`/`password=…` lines to `stdout`;
/// `store`/`erase` read and discard their input.
pub fn run(registry: &CredentialRegistry, repo_path: &str, action: &str, stdin: impl BufRead) -> i32 {
    match action {
        "get" => {
            let mut request = chub_git::CredentialsRequest::default();
            let parsed = chub_git::parse_stdin_request(stdin);
            request.protocol = parsed.protocol;
            request.host = parsed.host;
            request.path = repo_path.to_string();

            let response = chub_git::render_get_response(registry, &request);
            print!("{response}");
            0
        }
        "store" | "erase" => {
            chub_git::drain_stdin(stdin);
            0
        }
        other => {
            eprintln!("Unknown Action: {other}");
            1
        }
    }
}
