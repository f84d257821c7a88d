//! REST store behavior against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use policysync::prelude::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{init_tracing, scope};

async fn rest_store(server: &MockServer) -> Arc<RestPolicyStore> {
    init_tracing();
    Arc::new(
        RestPolicyStore::builder()
            .base_url(server.uri())
            .unwrap()
            .api_key("test-key")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap(),
    )
}

fn resource_page(keys: &[&str]) -> serde_json::Value {
    serde_json::json!(keys
        .iter()
        .map(|key| serde_json::json!({ "key": key, "name": key }))
        .collect::<Vec<_>>())
}

#[tokio::test]
async fn pagination_walks_until_a_short_page() {
    let server = MockServer::start().await;

    // page 1 is full (100 items), page 2 is short
    let full: Vec<String> = (0..100).map(|i| format!("res{}", i)).collect();
    let full_refs: Vec<&str> = full.iter().map(String::as_str).collect();
    Mock::given(method("GET"))
        .and(path("/v2/schema/storefront/dev/resources"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(resource_page(&full_refs)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/schema/storefront/dev/resources"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(resource_page(&["tail"])))
        .expect(1)
        .mount(&server)
        .await;

    let store = rest_store(&server).await;
    let resources = store.list_resources(&scope()).await.unwrap();
    assert_eq!(resources.len(), 101);
    assert_eq!(resources.last().unwrap().key, "tail");
}

#[tokio::test]
async fn status_codes_map_to_error_kinds() {
    let server = MockServer::start().await;
    for (status, endpoint) in [(401u16, "a"), (403, "b"), (404, "c"), (429, "d"), (503, "e")] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/schema/storefront/dev/resources/{}", endpoint)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let store = rest_store(&server).await;
    for (key, kind) in [
        ("a", ErrorKind::Unauthorized),
        ("b", ErrorKind::Forbidden),
        ("c", ErrorKind::NotFound),
        ("d", ErrorKind::RateLimited),
        ("e", ErrorKind::Unavailable),
    ] {
        let err = store.get_resource(&scope(), key).await.unwrap_err();
        assert_eq!(err.kind(), kind, "status for '{}'", key);
    }
}

#[tokio::test]
async fn reconciler_recovers_from_duplicate_create() {
    let server = MockServer::start().await;

    // the read path misses, the create conflicts, then the read path hits
    Mock::given(method("GET"))
        .and(path("/v2/schema/storefront/dev/resources/document"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/schema/storefront/dev/resources"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error_code": "DUPLICATE_ENTITY",
            "message": "resource 'document' already exists"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/schema/storefront/dev/resources/document"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "key": "document",
            "name": "Document"
        })))
        .mount(&server)
        .await;

    let store = rest_store(&server).await;
    let reconciler = Reconciler::new(store);
    let ensured = reconciler
        .ensure_resource(
            &scope(),
            policysync::types::ResourceCreate::new("document", "Document"),
        )
        .await
        .unwrap();
    assert!(!ensured.created);
    assert_eq!(ensured.entity.key, "document");
}

#[tokio::test]
async fn ingestion_runs_against_the_rest_store() {
    let server = MockServer::start().await;

    // empty environment: pre-fetch and entity reads miss, creates succeed
    Mock::given(method("GET"))
        .and(path("/v2/schema/storefront/dev/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/schema/storefront/dev/resources/document"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/schema/storefront/dev/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "key": "document",
            "name": "Document"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/schema/storefront/dev/resources/document/actions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/facts/storefront/dev/proxy_configs/openapi"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/facts/storefront/dev/proxy_configs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let document = SpecDocument::from_json(
        r#"{ "paths": { "/docs/{id}": { "x-policy-resource": "document", "get": {} } } }"#,
    )
    .unwrap();

    let store = rest_store(&server).await;
    let pipeline = IngestionPipeline::new(store)
        .with_options(IngestOptions::default().with_settle_delay(Duration::ZERO));
    let report = pipeline.ingest(&scope(), &document).await;

    assert_eq!(report.status(), IngestStatus::Success, "errors: {:?}", report.errors);
    assert_eq!(report.resources_created, 1);
    assert_eq!(report.actions_created, 1);
    assert_eq!(report.mapping_rules_written, 1);
}
