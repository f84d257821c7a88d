//! End-to-end ingestion flows against the in-memory store.

use policysync::prelude::*;

use crate::common::{full_document, pipeline, scope, store};

#[tokio::test]
async fn full_document_builds_the_whole_model() {
    let store = store();
    let report = pipeline(store.clone()).ingest(&scope(), &full_document()).await;

    assert_eq!(report.status(), IngestStatus::Success, "errors: {:?}", report.errors);

    // document from the paths, folder stubbed by the relation
    let document = store.get_resource(&scope(), "document").await.unwrap();
    assert!(document.actions.contains_key("get"));
    assert!(document.actions.contains_key("create"));
    assert!(store.get_resource(&scope(), "folder").await.is_ok());

    // roles accumulated permissions across operations
    let librarian = store.get_role(&scope(), "librarian").await.unwrap();
    assert_eq!(
        librarian.permissions,
        vec!["document:get".to_string(), "document:create".to_string()]
    );
    let archivist = store.get_role(&scope(), "archivist").await.unwrap();
    assert_eq!(archivist.permissions, vec!["document:create".to_string()]);

    // relation and derivation
    let relations = store.list_relations(&scope(), "document").await.unwrap();
    assert_eq!(relations[0].map_key(), "document:parent:folder");

    let reader = store
        .get_resource_role(&scope(), "document", "reader")
        .await
        .unwrap();
    let grant = &reader.granted_to.as_ref().unwrap().users_with_role[0];
    assert_eq!(grant.role, "collaborator");
    assert_eq!(grant.on_resource, "folder");
    assert_eq!(grant.linked_by_relation, "parent");

    // resource role got the resource's collected actions as permissions
    let maintainer = store
        .get_resource_role(&scope(), "document", "maintainer")
        .await
        .unwrap();
    assert!(maintainer
        .permissions
        .contains(&"document:get".to_string()));
    assert!(maintainer
        .permissions
        .contains(&"document:create".to_string()));

    // routing rules replaced as one batch under the default namespace
    let config = store.mapping_config(&scope(), "openapi").unwrap();
    assert_eq!(config.auth_mechanism, "Bearer");
    assert_eq!(config.secret, "openapi_token");
    assert_eq!(config.mapping_rules.len(), 3);
    assert!(config.mapping_rules.iter().any(|rule| {
        rule.url == "https://api.example.com/docs/{id}"
            && rule.http_method == "get"
            && rule.resource == "document"
            && rule.action == "get"
    }));
}

#[tokio::test]
async fn reingestion_is_idempotent() {
    let store = store();
    let pipeline = pipeline(store);
    let document = full_document();

    let first = pipeline.ingest(&scope(), &document).await;
    assert_eq!(first.status(), IngestStatus::Success);
    assert!(first.created_total() > 0);

    let second = pipeline.ingest(&scope(), &document).await;
    assert_eq!(second.status(), IngestStatus::Success, "errors: {:?}", second.errors);
    assert_eq!(second.created_total(), 0);
    assert_eq!(second.derivations_resolved, 1);
}

#[tokio::test]
async fn sanitized_keys_flow_through_every_phase() {
    let store = store();
    let document = SpecDocument::from_json(
        r#"{
            "paths": {
                "/line-items": {
                    "x-policy-resource": "line item",
                    "get": { "x-policy-action": "read one" }
                }
            }
        }"#,
    )
    .unwrap();

    let report = pipeline(store.clone()).ingest(&scope(), &document).await;
    assert_eq!(report.status(), IngestStatus::Success);

    let resource = store.get_resource(&scope(), "line_item").await.unwrap();
    assert!(resource.actions.contains_key("read_one"));

    let config = store.mapping_config(&scope(), "openapi").unwrap();
    assert_eq!(config.mapping_rules[0].resource, "line_item");
    assert_eq!(config.mapping_rules[0].action, "read_one");
}

#[tokio::test]
async fn unannotated_paths_are_ignored() {
    let store = store();
    let document = SpecDocument::from_json(
        r#"{
            "paths": {
                "/health": { "get": {} },
                "/docs": { "x-policy-resource": "document", "get": {} }
            }
        }"#,
    )
    .unwrap();

    let report = pipeline(store.clone()).ingest(&scope(), &document).await;
    assert_eq!(report.resources_created, 1);

    let config = store.mapping_config(&scope(), "openapi").unwrap();
    assert_eq!(config.mapping_rules.len(), 1);
    assert_eq!(config.mapping_rules[0].url, "/docs");
}

#[tokio::test]
async fn custom_namespace_and_secret_are_honored() {
    let store = store();
    let options = IngestOptions::default()
        .with_settle_delay(std::time::Duration::ZERO)
        .with_mapping_namespace("gateway")
        .with_mapping_secret("gateway_token");
    let pipeline = IngestionPipeline::new(store.clone()).with_options(options);

    let document = SpecDocument::from_json(
        r#"{ "paths": { "/docs": { "x-policy-resource": "document", "get": {} } } }"#,
    )
    .unwrap();
    pipeline.ingest(&scope(), &document).await;

    assert!(store.mapping_config(&scope(), "openapi").is_none());
    let config = store.mapping_config(&scope(), "gateway").unwrap();
    assert_eq!(config.secret, "gateway_token");
}
