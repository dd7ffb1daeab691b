use std::collections::BTreeMap;

/// In-memory 3-level index over a credential namespace (spec §4.6),
/// `app → profile → label → full credential name`.
///
/// Rebuilt from a `find_by_path` listing on every `CredhubSource` request;
/// the store is authoritative, so no cross-request cache is kept.
#[derive(Debug, Default, Clone)]
pub struct CredentialsIndex {
    by_app: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
}

impl CredentialsIndex {
    /// Construct an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a flat listing of full credential names.
    pub fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut index = Self::new();
        for name in names {
            index.add(name);
        }
        index
    }

    /// Insert `name` under `index[app][profile][label]`, where `app`,
    /// `profile`, `label` are the 4th-, 3rd-, and 2nd-from-last `/`-segments
    /// of `name` (the last segment is expected to be `secrets`, preserved
    /// verbatim in the stored full name).
    pub fn add(&mut self, name: String) {
        let components: Vec<&str> = name.split('/').collect();
        let size = components.len();
        if size < 4 {
            return;
        }
        let app = components[size - 4].to_string();
        let profile = components[size - 3].to_string();
        let label = components[size - 2].to_string();

        self.by_app
            .entry(app)
            .or_default()
            .entry(profile)
            .or_default()
            .insert(label, name);
    }

    /// Whether a credential exists at the exact `(app, profile, label)` scope.
    pub fn contains(&self, app: &str, profile: &str, label: &str) -> bool {
        self.by_app
            .get(app)
            .and_then(|profiles| profiles.get(profile))
            .is_some_and(|labels| labels.contains_key(label))
    }

    /// Resolve the full credential name at an exact scope, if present.
    pub fn name_at(&self, app: &str, profile: &str, label: &str) -> Option<&str> {
        self.by_app
            .get(app)
            .and_then(|profiles| profiles.get(profile))
            .and_then(|labels| labels.get(label))
            .map(String::as_str)
    }

    /// Like [`filter`](Self::filter) but keeps the `(app, profile, label)`
    /// scope of each match alongside its full credential name, so callers
    /// can name response layers from the scope rather than reparsing it.
    pub fn filter_scoped(
        &self,
        apps: &[String],
        profiles: &[String],
        labels: &[String],
    ) -> Vec<(String, String, String, String)> {
        let mut result = Vec::new();
        let app_scope: Vec<&String> = if apps.is_empty() {
            self.by_app.keys().collect()
        } else {
            apps.iter().collect()
        };

        for app in app_scope {
            let Some(profile_map) = self.by_app.get(app) else {
                continue;
            };
            let profile_scope: Vec<&String> = if profiles.is_empty() {
                profile_map.keys().collect()
            } else {
                profiles.iter().collect()
            };
            for profile in profile_scope {
                let Some(label_map) = profile_map.get(profile) else {
                    continue;
                };
                let label_scope: Vec<&String> = if labels.is_empty() {
                    label_map.keys().collect()
                } else {
                    labels.iter().collect()
                };
                for label in label_scope {
                    if let Some(name) = label_map.get(label) {
                        result.push((app.clone(), profile.clone(), label.clone(), name.clone()));
                    }
                }
            }
        }
        result
    }

    /// Filter credential names by `(apps, profiles, labels)` (spec §4.6):
    /// an empty dimension matches everything at that level; a non-empty one
    /// restricts to the named values.
    pub fn filter(&self, apps: &[String], profiles: &[String], labels: &[String]) -> Vec<String> {
        let mut result = Vec::new();
        let app_scope: Vec<&String> = if apps.is_empty() {
            self.by_app.keys().collect()
        } else {
            apps.iter().collect()
        };

        for app in app_scope {
            let Some(profile_map) = self.by_app.get(app) else {
                continue;
            };
            let profile_scope: Vec<&String> = if profiles.is_empty() {
                profile_map.keys().collect()
            } else {
                profiles.iter().collect()
            };
            for profile in profile_scope {
                let Some(label_map) = profile_map.get(profile) else {
                    continue;
                };
                if labels.is_empty() {
                    result.extend(label_map.values().cloned());
                } else {
                    for label in labels {
                        if let Some(name) = label_map.get(label) {
                            result.push(name.clone());
                        }
                    }
                }
            }
        }
        result
    }

    /// Enumerate every `(app, profile, label)` scope present in the index,
    /// without resolving credential contents (used by `ListSecrets`).
    pub fn scopes(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.by_app.iter().flat_map(|(app, profiles)| {
            profiles.iter().flat_map(move |(profile, labels)| {
                labels
                    .keys()
                    .map(move |label| (app.as_str(), profile.as_str(), label.as_str()))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> CredentialsIndex {
        CredentialsIndex::from_names(vec![
            "/p/svc/dev/master/secrets".to_string(),
            "/p/svc/prod/master/secrets".to_string(),
            "/p/application/default/master/secrets".to_string(),
        ])
    }

    #[test]
    fn contains_exact_scope() {
        let index = sample_index();
        assert!(index.contains("svc", "dev", "master"));
        assert!(!index.contains("svc", "staging", "master"));
    }

    #[test]
    fn filter_scoped_carries_app_profile_label() {
        let index = sample_index();
        let matches = index.filter_scoped(&["svc".to_string()], &["dev".to_string()], &["master".to_string()]);
        assert_eq!(
            matches,
            vec![(
                "svc".to_string(),
                "dev".to_string(),
                "master".to_string(),
                "/p/svc/dev/master/secrets".to_string()
            )]
        );
    }

    #[test]
    fn filter_with_empty_apps_returns_everything() {
        let index = sample_index();
        let mut names = index.filter(&[], &[], &[]);
        names.sort();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn filter_narrows_by_app_then_profile_then_label() {
        let index = sample_index();
        let names = index.filter(&["svc".to_string()], &["dev".to_string()], &["master".to_string()]);
        assert_eq!(names, vec!["/p/svc/dev/master/secrets".to_string()]);
    }

    #[test]
    fn filter_with_empty_profiles_returns_all_profiles_for_app() {
        let index = sample_index();
        let mut names = index.filter(&["svc".to_string()], &[], &[]);
        names.sort();
        assert_eq!(
            names,
            vec![
                "/p/svc/dev/master/secrets".to_string(),
                "/p/svc/prod/master/secrets".to_string(),
            ]
        );
    }

    #[test]
    fn filter_unmatched_label_returns_nothing() {
        let index = sample_index();
        assert!(index
            .filter(&["svc".to_string()], &["dev".to_string()], &["release".to_string()])
            .is_empty());
    }
}
