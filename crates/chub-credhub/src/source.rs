use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chub_domain::{PropertySource, Source};
use chub_error::ChubError;
use serde_json::{Map, Value};
use tracing::error;

use crate::error::CredhubError;
use crate::index::CredentialsIndex;
use crate::store::SecretStoreClient;

static CONSTRUCTED: AtomicBool = AtomicBool::new(false);

/// A flat `(app, profile, label, name)` row for the `ListSecrets`
/// compatibility endpoint (spec §4.7, §6).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SecretName {
    /// Application name.
    pub app: String,
    /// Profile name.
    pub profile: String,
    /// Label.
    pub label: String,
    /// Top-level key within the credential.
    pub name: String,
}

/// The credhub-backed property source (spec §4.7, component G).
///
/// At most one instance exists per process, enforced by [`CONSTRUCTED`];
/// attempting a second construction returns [`CredhubError::OnlyOneCredhubSource`].
pub struct CredhubSource {
    prefix: String,
    client: Arc<dyn SecretStoreClient>,
}

impl CredhubSource {
    /// Construct the process's singleton credhub source. `prefix` is
    /// normalized to begin and end with `/`.
    pub fn new(prefix: &str, client: Arc<dyn SecretStoreClient>) -> Result<Self, CredhubError> {
        if CONSTRUCTED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CredhubError::OnlyOneCredhubSource);
        }
        Ok(Self {
            prefix: normalize_prefix(prefix),
            client,
        })
    }

    async fn existing_index(&self) -> Result<CredentialsIndex, CredhubError> {
        let names = self.client.find_by_path(&self.prefix).await?;
        Ok(CredentialsIndex::from_names(names))
    }

    fn credential_name(&self, app: &str, profile: &str, label: &str) -> String {
        format!("{}{app}/{profile}/{label}/secrets", self.prefix)
    }

    /// `AddSecrets` (spec §4.7): deep-merge `payload` into each matching
    /// credential, creating it if absent.
    pub async fn add_secrets(
        &self,
        apps: &[String],
        profiles: &[String],
        labels: &[String],
        payload: &BTreeMap<String, Value>,
    ) -> Result<(), CredhubError> {
        let apps = default_if_empty(apps, "application");
        let profiles = default_if_empty(profiles, "default");
        let labels = default_if_empty(labels, "master");

        let index = self.existing_index().await?;

        for app in &apps {
            for profile in &profiles {
                for label in &labels {
                    let name = self.credential_name(app, profile, label);
                    let merged = if index.contains(app, profile, label) {
                        let existing = self.client.get_json_by_name(&name).await.map_err(|e| {
                            CredhubError::CredentialReadFailure {
                                name: name.clone(),
                                cause: e.to_string(),
                            }
                        })?;
                        deep_merge(&existing, payload)
                    } else {
                        payload.clone()
                    };
                    self.client.set_json_by_name(&name, merged).await?;
                }
            }
        }
        Ok(())
    }

    /// `DeleteSecrets` (spec §4.7): remove each dotted key from every
    /// matching credential, rewriting it only if something was actually
    /// removed.
    pub async fn delete_secrets(
        &self,
        apps: &[String],
        profiles: &[String],
        labels: &[String],
        dotted_keys: &[String],
    ) -> Result<(), CredhubError> {
        let apps = default_if_empty(apps, "application");
        let profiles = default_if_empty(profiles, "default");
        let labels = default_if_empty(labels, "master");

        let index = self.existing_index().await?;

        for app in &apps {
            for profile in &profiles {
                for label in &labels {
                    if !index.contains(app, profile, label) {
                        continue;
                    }
                    let name = self.credential_name(app, profile, label);
                    let existing = self.client.get_json_by_name(&name).await.map_err(|e| {
                        CredhubError::CredentialReadFailure {
                            name: name.clone(),
                            cause: e.to_string(),
                        }
                    })?;
                    let mut map: Map<String, Value> = existing.into_iter().collect();
                    let mut changed = false;
                    for dotted_key in dotted_keys {
                        let segments: Vec<&str> = dotted_key.split('.').collect();
                        if delete_at(&mut map, &segments) {
                            changed = true;
                        }
                    }
                    if changed {
                        self.client
                            .set_json_by_name(&name, map.into_iter().collect())
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// `ListSecrets` (spec §4.7): `app → profile → label → [keyName]`.
    pub async fn list_secrets(
        &self,
        apps: &[String],
        profiles: &[String],
        labels: &[String],
    ) -> Result<BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>, CredhubError> {
        let index = self.existing_index().await?;
        let matches = index.filter_scoped(apps, profiles, labels);

        let mut result: BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>> = BTreeMap::new();
        for (app, profile, label, name) in matches {
            let keys = match self.client.get_json_by_name(&name).await {
                Ok(credential) => credential.into_keys().collect(),
                Err(e) => {
                    error!("skipping unreadable credential {name}: {e}");
                    continue;
                }
            };
            result
                .entry(app)
                .or_default()
                .entry(profile)
                .or_default()
                .insert(label, keys);
        }
        Ok(result)
    }

    /// The old config-server-compatible flattening of [`Self::list_secrets`].
    pub async fn list_secrets_compatible(
        &self,
        apps: &[String],
        profiles: &[String],
        labels: &[String],
    ) -> Result<Vec<SecretName>, CredhubError> {
        let nested = self.list_secrets(apps, profiles, labels).await?;
        let mut flat = Vec::new();
        for (app, profiles) in nested {
            for (profile, labels) in profiles {
                for (label, names) in labels {
                    for name in names {
                        flat.push(SecretName {
                            app: app.clone(),
                            profile: profile.clone(),
                            label: label.clone(),
                            name,
                        });
                    }
                }
            }
        }
        Ok(flat)
    }
}

#[async_trait]
impl Source for CredhubSource {
    fn name(&self) -> String {
        "credhub".to_string()
    }

    async fn find_properties(
        &self,
        apps: &[String],
        profiles: &[String],
        label: Option<&str>,
    ) -> Result<Vec<PropertySource>, ChubError> {
        let index = self.existing_index().await.map_err(ChubError::from)?;

        let apps = ensure_application(apps);
        let profiles = ensure_default_profile(profiles);
        let labels = ensure_master_label(label);

        let matches = index.filter_scoped(&apps, &profiles, &labels);

        if matches.is_empty() {
            let source_name = format!("credhub-{}-{}-{}", apps[0], profiles[0], labels[0]);
            return Ok(vec![PropertySource {
                source: source_name,
                properties: BTreeMap::new(),
            }]);
        }

        let mut layers = Vec::with_capacity(matches.len());
        for (app, profile, label, name) in matches {
            let source_name = format!("credhub-{app}-{profile}-{label}");
            let properties = match self.client.get_json_by_name(&name).await {
                Ok(properties) => properties,
                Err(e) => {
                    error!("credhub credential {name} unreadable: {e}");
                    BTreeMap::new()
                }
            };
            layers.push(PropertySource {
                source: source_name,
                properties,
            });
        }
        Ok(layers)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let mut p = prefix.to_string();
    if !p.starts_with('/') {
        p = format!("/{p}");
    }
    if !p.ends_with('/') {
        p.push('/');
    }
    p
}

fn default_if_empty(list: &[String], default: &str) -> Vec<String> {
    if list.is_empty() {
        vec![default.to_string()]
    } else {
        list.to_vec()
    }
}

/// `ensureApplication` (spec §4.7): guarantee the literal `application` is present.
fn ensure_application(apps: &[String]) -> Vec<String> {
    let mut result = apps.to_vec();
    if !result.iter().any(|a| a == "application") {
        result.push("application".to_string());
    }
    result
}

/// `ensureDefaultProfile` (spec §4.7): guarantee `default` is present.
fn ensure_default_profile(profiles: &[String]) -> Vec<String> {
    let mut result = profiles.to_vec();
    if !result.iter().any(|p| p == "default") {
        result.push("default".to_string());
    }
    result
}

/// `ensureMasterLabel` (spec §4.7).
fn ensure_master_label(label: Option<&str>) -> Vec<String> {
    match label {
        None => vec!["master".to_string()],
        Some(l) if l.is_empty() || l == "master" => vec!["master".to_string()],
        Some(l) => vec![l.to_string(), "master".to_string()],
    }
}

fn deep_merge(existing: &BTreeMap<String, Value>, overlay: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut base: Map<String, Value> = existing.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing_value) => merge_json(existing_value, value.clone()),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
    base.into_iter().collect()
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) => merge_json(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (slot, overlay_value) => *slot = overlay_value,
    }
}

/// Delete a dotted key from `map`: try the whole remaining path joined as a
/// literal key first, then walk it segment-by-segment, re-joining
/// unresolved prefix segments on miss before descending into a nested map.
fn delete_at(map: &mut Map<String, Value>, segments: &[&str]) -> bool {
    let full_key = segments.join(".");
    if map.contains_key(&full_key) {
        return map.remove(&full_key).is_some();
    }
    if segments.len() == 1 {
        return false;
    }
    for split in 1..segments.len() {
        let prefix_key = segments[..split].join(".");
        if let Some(Value::Object(sub)) = map.get_mut(&prefix_key) {
            if delete_at(sub, &segments[split..]) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Mutex as StdMutex;

    struct FakeStore {
        credentials: StdMutex<BTreeMap<String, BTreeMap<String, Value>>>,
    }

    impl FakeStore {
        fn new(entries: Vec<(&str, BTreeMap<String, Value>)>) -> Self {
            Self {
                credentials: StdMutex::new(
                    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl SecretStoreClient for FakeStore {
        async fn find_by_path(&self, _path: &str) -> Result<Vec<String>, CredhubError> {
            Ok(self.credentials.lock().unwrap().keys().cloned().collect())
        }

        async fn get_json_by_name(&self, name: &str) -> Result<BTreeMap<String, Value>, CredhubError> {
            self.credentials
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| CredhubError::CredentialReadFailure {
                    name: name.to_string(),
                    cause: "not found".to_string(),
                })
        }

        async fn set_json_by_name(&self, name: &str, value: BTreeMap<String, Value>) -> Result<(), CredhubError> {
            self.credentials.lock().unwrap().insert(name.to_string(), value);
            Ok(())
        }
    }

    fn reset_singleton() {
        CONSTRUCTED.store(false, Ordering::SeqCst);
    }

    #[test]
    fn normalizes_prefix_with_slashes() {
        assert_eq!(normalize_prefix("myapp"), "/myapp/");
        assert_eq!(normalize_prefix("/myapp/"), "/myapp/");
    }

    #[test]
    fn ensure_application_appends_when_absent() {
        assert_eq!(ensure_application(&[]), vec!["application".to_string()]);
        assert_eq!(
            ensure_application(&["svc".to_string()]),
            vec!["svc".to_string(), "application".to_string()]
        );
    }

    #[test]
    fn ensure_master_label_variants() {
        assert_eq!(ensure_master_label(None), vec!["master".to_string()]);
        assert_eq!(ensure_master_label(Some("")), vec!["master".to_string()]);
        assert_eq!(ensure_master_label(Some("master")), vec!["master".to_string()]);
        assert_eq!(
            ensure_master_label(Some("prod")),
            vec!["prod".to_string(), "master".to_string()]
        );
    }

    #[tokio::test]
    #[serial]
    async fn second_construction_is_rejected() {
        reset_singleton();
        let store = Arc::new(FakeStore::new(vec![]));
        let _first = CredhubSource::new("/p", store.clone()).unwrap();
        let second = CredhubSource::new("/p", store);
        assert!(matches!(second, Err(CredhubError::OnlyOneCredhubSource)));
        reset_singleton();
    }

    #[tokio::test]
    #[serial]
    async fn find_properties_emits_placeholder_layer_when_nothing_matches() {
        reset_singleton();
        let store = Arc::new(FakeStore::new(vec![]));
        let source = CredhubSource::new("/p", store).unwrap();

        let layers = source
            .find_properties(&["svc".to_string()], &["prod".to_string()], None)
            .await
            .unwrap();

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].source, "credhub-svc-prod-master");
        assert!(layers[0].properties.is_empty());
        reset_singleton();
    }

    #[tokio::test]
    #[serial]
    async fn find_properties_names_layer_from_scope() {
        reset_singleton();
        let mut properties = BTreeMap::new();
        properties.insert("k".to_string(), Value::String("v".to_string()));
        let store = Arc::new(FakeStore::new(vec![(
            "/p/application/default/master/secrets",
            properties,
        )]));
        let source = CredhubSource::new("/p", store).unwrap();

        let layers = source.find_properties(&[], &[], None).await.unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].source, "credhub-application-default-master");
        assert_eq!(layers[0].properties.get("k").unwrap(), "v");
        reset_singleton();
    }

    #[tokio::test]
    #[serial]
    async fn add_secrets_deep_merges_existing_mapping() {
        reset_singleton();
        let mut existing = BTreeMap::new();
        existing.insert(
            "a".to_string(),
            serde_json::json!({"b": 1, "c": 2}),
        );
        let store = Arc::new(FakeStore::new(vec![(
            "/p/application/default/master/secrets",
            existing,
        )]));
        let source = CredhubSource::new("/p", store.clone()).unwrap();

        let mut payload = BTreeMap::new();
        payload.insert("a".to_string(), serde_json::json!({"c": 9, "d": 4}));
        source.add_secrets(&[], &[], &[], &payload).await.unwrap();

        let merged = store
            .get_json_by_name("/p/application/default/master/secrets")
            .await
            .unwrap();
        assert_eq!(merged.get("a").unwrap(), &serde_json::json!({"b": 1, "c": 9, "d": 4}));
        reset_singleton();
    }

    #[tokio::test]
    #[serial]
    async fn delete_secrets_removes_nested_dotted_key() {
        reset_singleton();
        let mut existing = BTreeMap::new();
        existing.insert("a".to_string(), serde_json::json!({"b": 1, "c": 2}));
        let store = Arc::new(FakeStore::new(vec![(
            "/p/application/default/master/secrets",
            existing,
        )]));
        let source = CredhubSource::new("/p", store.clone()).unwrap();

        source
            .delete_secrets(&[], &[], &[], &["a.b".to_string()])
            .await
            .unwrap();

        let after = store
            .get_json_by_name("/p/application/default/master/secrets")
            .await
            .unwrap();
        assert_eq!(after.get("a").unwrap(), &serde_json::json!({"c": 2}));
        reset_singleton();
    }

    #[tokio::test]
    #[serial]
    async fn delete_secrets_is_noop_when_key_absent() {
        reset_singleton();
        let mut existing = BTreeMap::new();
        existing.insert("a".to_string(), Value::String("v".to_string()));
        let store = Arc::new(FakeStore::new(vec![(
            "/p/application/default/master/secrets",
            existing.clone(),
        )]));
        let source = CredhubSource::new("/p", store.clone()).unwrap();

        source
            .delete_secrets(&[], &[], &[], &["missing.key".to_string()])
            .await
            .unwrap();

        let after = store
            .get_json_by_name("/p/application/default/master/secrets")
            .await
            .unwrap();
        assert_eq!(after, existing);
        reset_singleton();
    }
}
