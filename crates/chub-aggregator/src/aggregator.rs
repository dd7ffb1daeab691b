use std::collections::BTreeMap;
use std::sync::Arc;

use chub_domain::{PropertySource, Source};
use regex::Regex;
use serde_json::Value;
use tracing::error;

use crate::merge::merge_map;

/// Fans a single `(applications, profiles, label)` request out to every
/// registered source and combines the results (spec component H).
///
/// Sources are held in configured order; that order is the precedence of
/// [`Aggregator::find_properties`]'s `propertySources` list (index 0
/// overrides every later index, per `chub_domain::Response`).
pub struct Aggregator {
    sources: Vec<Arc<dyn Source>>,
}

impl Aggregator {
    /// Build an aggregator over the given sources, in the order they should
    /// be queried and layered.
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Self {
        Self { sources }
    }

    /// The registered sources, in configured order (used by the dashboard
    /// endpoint to collect per-source reports).
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// The flattened-layer list variant served by the plain config-server
    /// endpoint.
    ///
    /// Splits `app_string` on `,`, fans out to every source in configured
    /// order, and flattens each returned layer's properties. A source that
    /// fails is logged and skipped; it never fails the whole request.
    pub async fn find_properties(
        &self,
        app_string: &str,
        profiles: &[String],
        label: Option<&str>,
    ) -> Vec<PropertySource> {
        let apps = split_apps(app_string);
        let mut layers = Vec::new();
        for source in &self.sources {
            match source.find_properties(&apps, profiles, label).await {
                Ok(found) => {
                    for layer in found {
                        let flattened = chub_properties::flatten_properties(&layer.properties);
                        layers.push(PropertySource {
                            source: layer.source,
                            properties: flattened,
                        });
                    }
                }
                Err(err) => {
                    error!(source = %source.name(), error = %err, "source failed, skipping");
                }
            }
        }
        layers
    }

    /// The typed/merged variant served by format-specific endpoints
    /// (`.json`, `.yml`, `.properties`).
    ///
    /// Collects raw (unflattened) layers, buckets them by profile via
    /// `.*-<profile>.*` matched against each layer's `source`, then merges
    /// buckets head-first over a reversed profile list so the
    /// first-requested profile wins.
    pub async fn find_properties_map(
        &self,
        app_string: &str,
        profiles: &[String],
        label: Option<&str>,
    ) -> BTreeMap<String, Value> {
        let apps = split_apps(app_string);
        let mut raw_layers = Vec::new();
        for source in &self.sources {
            match source.find_properties(&apps, profiles, label).await {
                Ok(found) => raw_layers.extend(found),
                Err(err) => {
                    error!(source = %source.name(), error = %err, "source failed, skipping");
                }
            }
        }

        let bucket_order = bucket_order(profiles);
        let profile_patterns: Vec<(String, Regex)> = bucket_order
            .iter()
            .filter(|p| p.as_str() != "default")
            .filter_map(|p| {
                Regex::new(&format!(".*-{}.*", regex::escape(p)))
                    .ok()
                    .map(|re| (p.clone(), re))
            })
            .collect();

        let mut buckets: Vec<(String, Vec<PropertySource>)> = bucket_order
            .iter()
            .cloned()
            .map(|name| (name, Vec::new()))
            .collect();

        for layer in raw_layers {
            let matched = profile_patterns
                .iter()
                .find(|(_, re)| re.is_match(&layer.source))
                .map(|(name, _)| name.clone());
            let bucket_name = matched.unwrap_or_else(|| "default".to_string());
            if let Some(bucket) = buckets.iter_mut().find(|(name, _)| *name == bucket_name) {
                bucket.1.push(layer);
            }
        }

        let mut accumulator: BTreeMap<String, Value> = BTreeMap::new();
        for (_, layers) in buckets {
            let mut bucket_map = BTreeMap::new();
            for layer in layers {
                merge_map(&mut bucket_map, &layer.properties);
            }
            merge_map(&mut accumulator, &bucket_map);
        }
        accumulator
    }
}

fn split_apps(app_string: &str) -> Vec<String> {
    app_string
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Build the bucket consumption order: the caller's profile list reversed
/// (so it is consumed head-first with the first-requested profile last,
/// i.e. winning), with an implicit `default` bucket prepended when `default`
/// was not itself requested.
fn bucket_order(profiles: &[String]) -> Vec<String> {
    let mut order: Vec<String> = profiles.iter().rev().cloned().collect();
    if !order.iter().any(|p| p == "default") {
        order.insert(0, "default".to_string());
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chub_error::ChubError;
    use std::sync::Mutex as StdMutex;

    struct FakeSource {
        name: String,
        layers: StdMutex<Vec<PropertySource>>,
    }

    impl FakeSource {
        fn new(name: &str, layers: Vec<PropertySource>) -> Self {
            Self {
                name: name.to_string(),
                layers: StdMutex::new(layers),
            }
        }
    }

    #[async_trait]
    impl Source for FakeSource {
        fn name(&self) -> String {
            self.name.clone()
        }

        async fn find_properties(
            &self,
            _apps: &[String],
            _profiles: &[String],
            _label: Option<&str>,
        ) -> Result<Vec<PropertySource>, ChubError> {
            Ok(self.layers.lock().unwrap().clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl Source for FailingSource {
        fn name(&self) -> String {
            "failing".to_string()
        }

        async fn find_properties(
            &self,
            _apps: &[String],
            _profiles: &[String],
            _label: Option<&str>,
        ) -> Result<Vec<PropertySource>, ChubError> {
            Err(ChubError::new(
                chub_error::ErrorCode::StoreUnavailable,
                "boom",
            ))
        }
    }

    fn layer(source: &str, properties: serde_json::Value) -> PropertySource {
        let map = properties
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        PropertySource {
            source: source.to_string(),
            properties: map,
        }
    }

    #[tokio::test]
    async fn find_properties_flattens_and_preserves_source_order() {
        let source = FakeSource::new(
            "git@example.com:org/repo.git",
            vec![layer("svc.yml", serde_json::json!({"a": {"b": 1}}))],
        );
        let aggregator = Aggregator::new(vec![Arc::new(source)]);

        let layers = aggregator
            .find_properties("svc", &["default".to_string()], None)
            .await;
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].properties.get("a.b").unwrap(), &serde_json::json!(1));
    }

    #[tokio::test]
    async fn failing_source_is_skipped_not_fatal() {
        let aggregator = Aggregator::new(vec![Arc::new(FailingSource)]);
        let layers = aggregator
            .find_properties("svc", &["default".to_string()], None)
            .await;
        assert!(layers.is_empty());
    }

    #[tokio::test]
    async fn find_properties_map_first_requested_profile_wins() {
        let source = FakeSource::new(
            "git",
            vec![
                layer("svc-dev.yml", serde_json::json!({"a": 1, "b": 2})),
                layer("svc.yml", serde_json::json!({"a": 9, "c": 3})),
            ],
        );
        let aggregator = Aggregator::new(vec![Arc::new(source)]);

        let merged = aggregator
            .find_properties_map("svc", &["dev".to_string()], None)
            .await;
        assert_eq!(merged.get("a").unwrap(), &serde_json::json!(1));
        assert_eq!(merged.get("b").unwrap(), &serde_json::json!(2));
        assert_eq!(merged.get("c").unwrap(), &serde_json::json!(3));
    }

    #[tokio::test]
    async fn find_properties_map_recurses_into_nested_objects() {
        let source = FakeSource::new(
            "credhub",
            vec![
                layer("credhub-svc-default-master", serde_json::json!({"a": {"b": 1, "c": 2}})),
                layer(
                    "credhub-svc-dev-master",
                    serde_json::json!({"a": {"c": 9, "d": 4}}),
                ),
            ],
        );
        let aggregator = Aggregator::new(vec![Arc::new(source)]);

        let merged = aggregator
            .find_properties_map("svc", &["dev".to_string()], None)
            .await;
        assert_eq!(
            merged.get("a").unwrap(),
            &serde_json::json!({"b": 1, "c": 9, "d": 4})
        );
    }
}
