//! Cross-environment migration flows.

use std::collections::BTreeMap;

use policysync::prelude::*;
use policysync::types::{ActionSpec, ResourceCreate};

use crate::common::{scope, store};

fn prod() -> Scope {
    Scope::new("acme", "storefront", "prod")
}

#[tokio::test]
async fn migration_carries_actions_and_attributes() {
    let store = store();
    let mut body = ResourceCreate::new("document", "Document");
    body.actions = BTreeMap::from([
        ("get".to_string(), ActionSpec::named("get")),
        ("create".to_string(), ActionSpec::named("create")),
    ]);
    store.create_resource(&scope(), &body).await.unwrap();

    let engine = MigrationEngine::within(store.clone());
    let stats = engine
        .migrate(&scope(), &prod(), ConflictStrategy::Fail)
        .await
        .unwrap();
    assert_eq!(stats.success, 1);

    let migrated = store.get_resource(&prod(), "document").await.unwrap();
    assert_eq!(migrated.actions.len(), 2);
    assert!(migrated.actions.contains_key("create"));
}

#[tokio::test]
async fn conflict_matrix() {
    // Pre-existing key in the target: fail counts it failed and leaves the
    // target untouched; override updates it exactly once.
    for (strategy, expect_success, expect_failed, expect_name) in [
        (ConflictStrategy::Fail, 0, 1, "Stale"),
        (ConflictStrategy::Override, 1, 0, "document"),
    ] {
        let store = store();
        store
            .create_resource(&scope(), &ResourceCreate::new("document", "document"))
            .await
            .unwrap();
        store
            .create_resource(&prod(), &ResourceCreate::new("document", "Stale"))
            .await
            .unwrap();

        let engine = MigrationEngine::within(store.clone());
        let stats = engine.migrate(&scope(), &prod(), strategy).await.unwrap();

        assert_eq!(stats.total, 1, "{:?}", strategy);
        assert_eq!(stats.success, expect_success, "{:?}", strategy);
        assert_eq!(stats.failed, expect_failed, "{:?}", strategy);

        let target = store.get_resource(&prod(), "document").await.unwrap();
        assert_eq!(target.name, expect_name, "{:?}", strategy);
    }
}

#[tokio::test]
async fn migrated_environment_exports_like_the_source() {
    let store = store();
    store
        .create_resource(&scope(), &ResourceCreate::new("document", "Document"))
        .await
        .unwrap();

    MigrationEngine::within(store.clone())
        .migrate(&scope(), &prod(), ConflictStrategy::Fail)
        .await
        .unwrap();

    let output = Exporter::new(store).export(&prod()).await;
    assert!(output
        .hcl
        .contains("resource \"policysync_resource\" \"document\""));
}

#[tokio::test]
async fn separate_stores_migrate_too() {
    let source = store();
    let target = store();
    source
        .create_resource(&scope(), &ResourceCreate::new("document", "Document"))
        .await
        .unwrap();

    let engine = MigrationEngine::new(source, target.clone());
    let stats = engine
        .migrate(&scope(), &scope(), ConflictStrategy::Fail)
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    assert!(target.get_resource(&scope(), "document").await.is_ok());
}
