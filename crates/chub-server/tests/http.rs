//! End-to-end HTTP surface tests over `build_app`, exercised with
//! `tower::ServiceExt::oneshot` against an in-process router.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chub_aggregator::Aggregator;
use chub_domain::{PropertySource, Source};
use chub_error::ChubError;
use chub_git::CredentialRegistry;
use chub_server::AppState;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

struct FakeSource {
    name: String,
    layers: Vec<PropertySource>,
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
        Ok(self.layers.clone())
    }

    async fn dashboard_report(&self) -> Option<String> {
        Some(format!("{} ok", self.name))
    }
}

fn layer(name: &str, properties: Value) -> PropertySource {
    let Value::Object(map) = properties else {
        panic!("expected object");
    };
    PropertySource {
        source: name.to_string(),
        properties: map.into_iter().collect::<BTreeMap<_, _>>(),
    }
}

fn state_with(sources: Vec<Arc<dyn Source>>) -> Arc<AppState> {
    Arc::new(AppState {
        aggregator: Arc::new(Aggregator::new(sources)),
        credhub: None,
        credentials: Arc::new(CredentialRegistry::new()),
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = chub_server::build_app(state_with(Vec::new()));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn plain_properties_endpoint_returns_layers_in_source_order() {
    let sources: Vec<Arc<dyn Source>> = vec![
        Arc::new(FakeSource {
            name: "repo-a".to_string(),
            layers: vec![layer("repo-a", serde_json::json!({"a.b": "1"}))],
        }),
        Arc::new(FakeSource {
            name: "repo-b".to_string(),
            layers: vec![layer("repo-b", serde_json::json!({"a.c": "2"}))],
        }),
    ];
    let app = chub_server::build_app(state_with(sources));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/myapp/default")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "myapp");
    assert_eq!(body["propertySources"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn plain_properties_endpoint_404s_when_nothing_matches() {
    let sources: Vec<Arc<dyn Source>> = vec![Arc::new(FakeSource {
        name: "empty".to_string(),
        layers: Vec::new(),
    })];
    let app = chub_server::build_app(state_with(sources));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/myapp/default")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn format_specific_endpoint_merges_and_flattens() {
    let sources: Vec<Arc<dyn Source>> = vec![Arc::new(FakeSource {
        name: "repo".to_string(),
        layers: vec![layer(
            "repo",
            serde_json::json!({"server": {"port": 8080}}),
        )],
    })];
    let app = chub_server::build_app(state_with(sources));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/myapp-default.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["server.port"], 8080);
}

#[tokio::test]
async fn format_specific_endpoint_rejects_unknown_extension() {
    let app = chub_server::build_app(state_with(Vec::new()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/myapp-default.toml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn secrets_endpoints_501_without_a_credhub_source() {
    let app = chub_server::build_app(state_with(Vec::new()));
    let response = app
        .oneshot(Request::builder().uri("/secrets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn dashboard_lists_every_source_report() {
    let sources: Vec<Arc<dyn Source>> = vec![Arc::new(FakeSource {
        name: "repo-a".to_string(),
        layers: Vec::new(),
    })];
    let app = chub_server::build_app(state_with(sources));

    let response = app
        .oneshot(Request::builder().uri("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let reports = body.as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["source"], "repo-a");
    assert_eq!(reports[0]["report"], "repo-a ok");
}
