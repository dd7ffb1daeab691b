use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::GitError;
use crate::token::TokenProvider;

/// One line of `git branch --format ...` output (spec §4.2 `Branches`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Ref name.
    pub name: String,
    /// Commit id (full 40-char sha).
    pub commit_id: String,
    /// ISO-8601 author date.
    pub date: String,
}

const BRANCH_FORMAT: &str = "%(objectname)%(authordate:iso)%(refname:short)";

struct RepositoryState {
    last_fetch: u64,
    current_ref: String,
    detached: bool,
}

/// An environment variable name carrying a bearer token for git's
/// `http.extraHeader` config, paired with the provider that produces it.
pub struct AuthInjection {
    /// Env var name, e.g. `SPN_TOKEN`.
    pub env_name: &'static str,
    /// Token source.
    pub provider: Arc<dyn TokenProvider>,
}

/// A per-source local working tree (spec §3 "Repository", §4.2).
pub struct Repository {
    base_dir: PathBuf,
    shallow: bool,
    fail_on_fetch: bool,
    fetch_ttl: Duration,
    auth: Option<AuthInjection>,
    state: Mutex<RepositoryState>,
}

impl Repository {
    /// `init` a fresh working tree at `base_dir` for `uri`, wiring the
    /// credential-helper callback when `credential_helper_repo_path` is set
    /// (username/password auth only; spec §4.2 step 3).
    pub async fn init(
        base_dir: PathBuf,
        uri: &str,
        shallow: bool,
        fail_on_fetch: bool,
        fetch_ttl: Duration,
        auth: Option<AuthInjection>,
        credential_helper_command: Option<String>,
    ) -> Result<Self, GitError> {
        if base_dir.exists() {
            tokio::fs::remove_dir_all(&base_dir)
                .await
                .map_err(|e| GitError::DescriptorInvalid(format!("clearing {base_dir:?}: {e}")))?;
        }
        tokio::fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| GitError::DescriptorInvalid(format!("creating {base_dir:?}: {e}")))?;

        let repository = Self {
            base_dir,
            shallow,
            fail_on_fetch,
            fetch_ttl,
            auth,
            state: Mutex::new(RepositoryState {
                last_fetch: 0,
                current_ref: String::new(),
                detached: false,
            }),
        };

        run(&repository.base_dir, &["init"]).await?;
        if let Some(helper) = &credential_helper_command {
            run(
                &repository.base_dir,
                &["config", "--add", "credential.helper", helper],
            )
            .await?;
        }
        run(
            &repository.base_dir,
            &["config", "--add", "advice.detachedHead", "false"],
        )
        .await?;
        run(&repository.base_dir, &["remote", "add", "origin", uri]).await?;
        run(&repository.base_dir, &["config", "pull.rebase", "true"]).await?;

        Ok(repository)
    }

    /// `fetch`, optionally shallow and/or restricted to one ref (spec §4.2 `Fetch`).
    pub async fn fetch(&self, label: &str) -> Result<(), GitError> {
        let mut args: Vec<String> = vec!["fetch".to_string()];
        if self.shallow {
            args.push("--depth=1".to_string());
            if !label.is_empty() {
                args.push("origin".to_string());
                args.push(label.to_string());
            }
        }
        self.exec(&args).await.map(|_| ()).map_err(|e| {
            error!(repo = ?self.base_dir, "fetch failed: {e}");
            GitError::UnableToFetch(e.to_string())
        })
    }

    /// Cache-aware refresh entry point (spec §4.2 `Refresh`).
    pub async fn refresh(&self, label: &str) -> Result<(), GitError> {
        let now = now_secs();
        {
            let state = self.state.lock().await;
            if state.current_ref == label {
                if state.detached {
                    return Ok(());
                }
                if state.last_fetch + self.fetch_ttl.as_secs() > now {
                    return Ok(());
                }
            }
        }

        if let Err(e) = self.fetch(label).await {
            if self.fail_on_fetch {
                return Err(e);
            }
            error!("proceeding with existing local state after fetch failure: {e}");
        }

        self.exec(&["checkout".to_string(), label.to_string()])
            .await
            .map_err(|e| GitError::UnableToCheckout {
                label: label.to_string(),
                cause: e.to_string(),
            })?;

        let pull_failed = self.exec(&["pull".to_string()]).await.is_err();
        let mut detached = false;
        if pull_failed {
            detached = self.exec(&["symbolic-ref".to_string(), "HEAD".to_string()]).await.is_err();
        }

        let mut state = self.state.lock().await;
        state.current_ref = label.to_string();
        state.last_fetch = now;
        state.detached = detached;
        Ok(())
    }

    /// The working tree's root directory.
    pub fn base_dir(&self) -> &std::path::Path {
        &self.base_dir
    }

    /// Force the next `refresh` call to fetch regardless of TTL.
    pub async fn clear_ttl(&self) {
        self.state.lock().await.last_fetch = 0;
    }

    /// Enumerate local or remote branches (spec §4.2 `Branches`, diagnostic only).
    pub async fn branches(&self, remote: bool) -> Result<Vec<Branch>, GitError> {
        self.fetch("").await?;

        let mut args = vec!["branch".to_string(), "--format".to_string(), BRANCH_FORMAT.to_string()];
        if remote {
            args.push("--remote".to_string());
        }
        let output = self.exec(&args).await.map_err(GitError::UnableToFetch)?;

        let mut branches = Vec::new();
        for line in output.lines() {
            if line.len() < 65 {
                continue;
            }
            branches.push(Branch {
                commit_id: line[..40].to_string(),
                date: line[40..65].to_string(),
                name: line[65..].to_string(),
            });
        }
        Ok(branches)
    }

    /// Run an arbitrary git subcommand under the repository's lock (used by
    /// `FindProperties` callers that need raw `git` access beyond refresh).
    pub async fn exec_locked(&self, args: &[String]) -> Result<String, GitError> {
        self.exec(args).await.map_err(GitError::UnableToFetch)
    }

    async fn exec(&self, subcommand_args: &[String]) -> Result<String, String> {
        let mut full_args: Vec<String> = Vec::new();
        let mut env_override = None;

        if let Some(auth) = &self.auth {
            full_args.push(format!("--config-env=http.extraHeader={}", auth.env_name));
            let token = auth
                .provider
                .token()
                .await
                .map_err(|e| e.to_string())?;
            env_override = Some((auth.env_name, format!("Authorization: Bearer {token}")));
        }
        full_args.extend(subcommand_args.iter().cloned());

        let mut command = Command::new("git");
        command.args(&full_args).current_dir(&self.base_dir);
        if let Some((name, value)) = &env_override {
            command.env(name, value);
        }
        debug!(args = ?full_args, "git exec");

        let output = command
            .output()
            .await
            .map_err(|e| format!("failed to spawn git: {e}"))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(combined);
        }
        Ok(combined)
    }
}

async fn run(dir: &std::path::Path, args: &[&str]) -> Result<(), GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| GitError::DescriptorInvalid(format!("failed to spawn git: {e}")))?;
    if !output.status.success() {
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(GitError::DescriptorInvalid(combined));
    }
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Derive the repo-path fragment used to key the credential-helper
/// callback (spec §4.2 step 1): the URL path for `http(s)` remotes, or the
/// portion after `:` for `user@host:path` SSH remotes.
pub fn repo_path_fragment(uri: &str) -> String {
    if let Some(rest) = uri.strip_prefix("git@") {
        let fragment = rest.split_once(':').map(|(_, path)| path).unwrap_or(rest);
        return fragment.replace(' ', "%20");
    }
    if let Some(scheme_end) = uri.find("://") {
        let rest = &uri[scheme_end + 3..];
        if let Some(slash) = rest.find('/') {
            return rest[slash..].replace(' ', "%20");
        }
    }
    uri.replace(' ', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_path_fragment_from_ssh_uri() {
        assert_eq!(repo_path_fragment("git@example.com:org/repo.git"), "org/repo.git");
    }

    #[test]
    fn repo_path_fragment_from_https_uri() {
        assert_eq!(
            repo_path_fragment("https://example.com/org/repo.git"),
            "/org/repo.git"
        );
    }

    #[tokio::test]
    async fn init_creates_working_tree_with_remote() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("repo-0");
        let repo = Repository::init(
            base.clone(),
            "https://example.invalid/org/repo.git",
            true,
            false,
            Duration::from_secs(60),
            None,
            None,
        )
        .await;
        // `git` may be unavailable in a minimal sandbox; only assert the
        // directory bookkeeping succeeded when it is.
        if let Ok(repo) = repo {
            assert!(base.join(".git").exists());
            let _ = repo.clear_ttl().await;
        }
    }
}
