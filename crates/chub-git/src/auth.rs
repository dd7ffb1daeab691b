use chub_domain::GitDescriptor;

use crate::error::GitError;

/// The resolved, mutually-exclusive auth method a `GitDescriptor` selects.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// No credentials; anonymous remote access.
    Anonymous,
    /// HTTP(S) username/password, also fed to the credential helper.
    UsernamePassword {
        /// Git username.
        username: String,
        /// Git password or PAT.
        password: String,
    },
    /// SSH private key. Declared in the descriptor shape but rejected at
    /// validation time — no ssh-agent story is defined (spec §9).
    PrivateKey,
    /// Azure AD service-principal client-credentials auth.
    AzSpn {
        /// Azure AD tenant id.
        tenant_id: String,
        /// SPN client id.
        client_id: String,
        /// Secret given directly, or `None` if resolved via credhub ref.
        secret: Option<String>,
        /// Credhub reference to resolve the secret from, if `secret` is `None`.
        credhub_ref: Option<String>,
        /// Credhub store client name, paired with `credhub_ref`.
        credhub_client: Option<String>,
        /// Credhub store client secret, paired with `credhub_ref`.
        credhub_secret: Option<String>,
    },
    /// Azure AD managed-identity workload-identity-federation auth.
    AzMiWif {
        /// Azure AD tenant id.
        tenant_id: String,
        /// Managed-identity id.
        mi_id: String,
        /// Federated-token issuer URL.
        wif_issuer: String,
        /// Federated-token client id.
        wif_client: String,
        /// Federated-token client secret.
        wif_secret: String,
        /// Username for the federated-token password-credentials request.
        username: String,
        /// Password for the federated-token password-credentials request.
        password: String,
    },
}

/// Validated, normalized view of a [`GitDescriptor`] (spec §4.5).
pub struct ValidatedDescriptor {
    /// Original descriptor, retained for `uri`/`searchPaths`/etc.
    pub descriptor: GitDescriptor,
    /// Resolved auth method.
    pub auth: AuthMethod,
    /// `fetchCacheTtl`, coerced up to the 60s minimum.
    pub fetch_cache_ttl_secs: u64,
}

/// Validate a [`GitDescriptor`], aggregating every violated rule into one error.
pub fn validate(descriptor: GitDescriptor) -> Result<ValidatedDescriptor, GitError> {
    let mut reasons = Vec::new();

    if descriptor.uri.is_empty() {
        reasons.push("uri is required".to_string());
    } else if !is_valid_uri(&descriptor.uri) {
        reasons.push(format!(
            "uri must be http(s) or an ssh-style git@ remote: {}",
            descriptor.uri
        ));
    }

    if descriptor.private_key.is_some() {
        reasons.push("privateKey auth is declared but not implemented".to_string());
    }

    let auth = select_auth_method(&descriptor, &mut reasons);

    let ttl = descriptor
        .fetch_cache_ttl
        .map(|t| t.max(chub_domain::MIN_FETCH_CACHE_TTL))
        .unwrap_or(chub_domain::MIN_FETCH_CACHE_TTL);

    if !reasons.is_empty() {
        return Err(GitError::DescriptorInvalid(reasons.join("; ")));
    }

    Ok(ValidatedDescriptor {
        descriptor,
        auth: auth.expect("auth resolved when no validation reasons were recorded"),
        fetch_cache_ttl_secs: ttl,
    })
}

fn is_valid_uri(uri: &str) -> bool {
    uri.starts_with("git@") || uri.starts_with("http://") || uri.starts_with("https://")
}

fn select_auth_method(descriptor: &GitDescriptor, reasons: &mut Vec<String>) -> Option<AuthMethod> {
    if descriptor.private_key.is_some() {
        return None;
    }

    let has_user_pass = descriptor.username.is_some() && descriptor.password.is_some();

    let spn_shape = descriptor.az_client.is_some()
        && (descriptor.az_secret.is_some() || descriptor.az_secret_credhub_ref.is_some());
    let mi_shape = descriptor.az_mi_id.is_some()
        && descriptor.az_mi_wif_issuer.is_some()
        && descriptor.az_mi_wif_client.is_some()
        && descriptor.az_mi_wif_secret.is_some()
        && descriptor.username.is_some()
        && descriptor.password.is_some();

    let tenant_set = descriptor.az_tenant_id.is_some();

    if spn_shape && mi_shape {
        reasons.push("azSpn and azMiWif auth cannot both be active".to_string());
        return None;
    }

    if tenant_set && !spn_shape && !mi_shape {
        reasons.push(
            "azTenantId is set but neither the SPN nor the MI-WIF shape is satisfied".to_string(),
        );
        return None;
    }

    if spn_shape {
        let Some(tenant_id) = descriptor.az_tenant_id.clone() else {
            reasons.push("azSpn auth requires azTenantId".to_string());
            return None;
        };
        return Some(AuthMethod::AzSpn {
            tenant_id,
            client_id: descriptor.az_client.clone().unwrap(),
            secret: descriptor.az_secret.clone(),
            credhub_ref: descriptor.az_secret_credhub_ref.clone(),
            credhub_client: descriptor.az_secret_credhub_client.clone(),
            credhub_secret: descriptor.az_secret_credhub_secret.clone(),
        });
    }

    if mi_shape {
        let Some(tenant_id) = descriptor.az_tenant_id.clone() else {
            reasons.push("azMiWif auth requires azTenantId".to_string());
            return None;
        };
        return Some(AuthMethod::AzMiWif {
            tenant_id,
            mi_id: descriptor.az_mi_id.clone().unwrap(),
            wif_issuer: descriptor.az_mi_wif_issuer.clone().unwrap(),
            wif_client: descriptor.az_mi_wif_client.clone().unwrap(),
            wif_secret: descriptor.az_mi_wif_secret.clone().unwrap(),
            username: descriptor.username.clone().unwrap(),
            password: descriptor.password.clone().unwrap(),
        });
    }

    if has_user_pass {
        return Some(AuthMethod::UsernamePassword {
            username: descriptor.username.clone().unwrap(),
            password: descriptor.password.clone().unwrap(),
        });
    }

    if descriptor.username.is_some() != descriptor.password.is_some() {
        reasons.push("username and password must both be set or both be absent".to_string());
        return None;
    }

    Some(AuthMethod::Anonymous)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_descriptor(uri: &str) -> GitDescriptor {
        GitDescriptor {
            uri: uri.to_string(),
            deep_clone: false,
            default_label: None,
            search_paths: Vec::new(),
            skip_ssl_validation: false,
            fail_on_fetch: false,
            fetch_cache_ttl: None,
            username: None,
            password: None,
            private_key: None,
            az_tenant_id: None,
            az_client: None,
            az_secret: None,
            az_secret_credhub_ref: None,
            az_secret_credhub_client: None,
            az_secret_credhub_secret: None,
            az_mi_id: None,
            az_mi_wif_issuer: None,
            az_mi_wif_client: None,
            az_mi_wif_secret: None,
        }
    }

    #[test]
    fn anonymous_when_nothing_configured() {
        let v = validate(base_descriptor("https://example.com/repo.git")).unwrap();
        assert!(matches!(v.auth, AuthMethod::Anonymous));
        assert_eq!(v.fetch_cache_ttl_secs, 60);
    }

    #[test]
    fn rejects_missing_uri() {
        assert!(validate(base_descriptor("")).is_err());
    }

    #[test]
    fn rejects_private_key() {
        let mut d = base_descriptor("git@example.com:org/repo.git");
        d.private_key = Some("-----BEGIN-----".to_string());
        assert!(validate(d).is_err());
    }

    #[test]
    fn ttl_below_minimum_is_coerced() {
        let mut d = base_descriptor("https://example.com/repo.git");
        d.fetch_cache_ttl = Some(5);
        let v = validate(d).unwrap();
        assert_eq!(v.fetch_cache_ttl_secs, 60);
    }

    #[test]
    fn spn_requires_secret_or_credhub_ref() {
        let mut d = base_descriptor("https://example.com/repo.git");
        d.az_tenant_id = Some("tenant".to_string());
        d.az_client = Some("client".to_string());
        assert!(validate(d).is_err());
    }

    #[test]
    fn spn_resolves_when_secret_present() {
        let mut d = base_descriptor("https://example.com/repo.git");
        d.az_tenant_id = Some("tenant".to_string());
        d.az_client = Some("client".to_string());
        d.az_secret = Some("s3cr3t".to_string());
        let v = validate(d).unwrap();
        assert!(matches!(v.auth, AuthMethod::AzSpn { .. }));
    }

    #[test]
    fn spn_and_mi_cannot_both_be_active() {
        let mut d = base_descriptor("https://example.com/repo.git");
        d.az_tenant_id = Some("tenant".to_string());
        d.az_client = Some("client".to_string());
        d.az_secret = Some("s3cr3t".to_string());
        d.az_mi_id = Some("mi".to_string());
        d.az_mi_wif_issuer = Some("https://issuer".to_string());
        d.az_mi_wif_client = Some("wif-client".to_string());
        d.az_mi_wif_secret = Some("wif-secret".to_string());
        d.username = Some("u".to_string());
        d.password = Some("p".to_string());
        assert!(validate(d).is_err());
    }
}
