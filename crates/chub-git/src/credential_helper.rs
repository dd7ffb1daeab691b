use std::collections::HashMap;
use std::io::BufRead;

use chub_domain::GitDescriptor;

const DEFAULT_USERNAME: &str = "user";
const DEFAULT_PASSWORD: &str = "password";

/// Process-wide `uri → descriptor` mapping populated once at startup and
/// never mutated thereafter (spec §5), backing the git credential-helper
/// callback and the `POST /credentials` HTTP endpoint.
#[derive(Default)]
pub struct CredentialRegistry {
    by_uri: HashMap<String, GitDescriptor>,
}

impl CredentialRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its own `uri`, keyed exactly as git will
    /// reconstruct it from `protocol://host/path`.
    pub fn register(&mut self, descriptor: GitDescriptor) {
        self.by_uri.insert(descriptor.uri.clone(), descriptor);
    }

    /// Resolve `(username, password)` for a `protocol://host<repo>` request,
    /// defaulting to `"user"`/`"password"` when the descriptor configured
    /// neither (matching the original's `ite` fallback).
    pub fn lookup(&self, protocol: &str, host: &str, repo: &str) -> Option<(String, String)> {
        let key = format!("{protocol}://{host}{repo}");
        self.by_uri.get(&key).map(|d| {
            (
                d.username.clone().unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
                d.password.clone().unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            )
        })
    }
}

/// A `key=value` request parsed from the credential-helper's stdin protocol
/// or the `POST /credentials` JSON body (spec §6).
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CredentialsRequest {
    /// `http` or `https`.
    pub protocol: String,
    /// Remote host.
    pub host: String,
    /// Repo path fragment, e.g. `/org/repo.git`.
    #[serde(default)]
    pub path: String,
}

/// Parse `key=value` lines from the credential-helper stdin protocol until
/// a blank line or EOF.
pub fn parse_stdin_request(reader: impl BufRead) -> CredentialsRequest {
    let mut request = CredentialsRequest::default();
    for line in reader.lines().map_while(Result::ok) {
        if line.is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "protocol" => request.protocol = value.to_string(),
            "host" => request.host = value.to_string(),
            "path" => request.path = value.to_string(),
            _ => {}
        }
    }
    request
}

/// Render the `get` action's stdout response, or an empty string if no
/// descriptor matches (git then falls back to its own credential prompt).
pub fn render_get_response(registry: &CredentialRegistry, request: &CredentialsRequest) -> String {
    match registry.lookup(&request.protocol, &request.host, &request.path) {
        Some((username, password)) => format!(
            "protocol={}\nhost={}\nusername={}\npassword={}\n",
            request.protocol, request.host, username, password
        ),
        None => String::new(),
    }
}

/// `store`/`erase` actions read and discard their stdin payload (§2 supplement).
pub fn drain_stdin(reader: impl BufRead) {
    for line in reader.lines().map_while(Result::ok) {
        if line.is_empty() {
            break;
        }
    }
}
