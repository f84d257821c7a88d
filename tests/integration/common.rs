//! Shared fixtures for policysync integration tests.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use policysync::prelude::*;

static TRACING: OnceLock<()> = OnceLock::new();

/// Installs a test tracing subscriber once per process.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "policysync=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn scope() -> Scope {
    Scope::new("acme", "storefront", "dev")
}

/// An empty in-memory store behind the trait object the engine wants.
pub fn store() -> Arc<InMemoryPolicyStore> {
    init_tracing();
    Arc::new(InMemoryPolicyStore::new())
}

/// A pipeline with the settle delay zeroed; tests never need to wait out
/// a consistency window against the in-memory store.
pub fn pipeline(store: Arc<InMemoryPolicyStore>) -> IngestionPipeline {
    IngestionPipeline::new(store)
        .with_options(IngestOptions::default().with_settle_delay(Duration::ZERO))
}

/// A document exercising every annotation kind: resources, explicit and
/// implicit actions, roles, a relation, a resource role, and a derivation.
pub fn full_document() -> SpecDocument {
    SpecDocument::from_json(
        r#"{
            "servers": [{ "url": "https://api.example.com" }],
            "paths": {
                "/docs": {
                    "x-policy-resource": "document",
                    "get": { "x-policy-role": "librarian" },
                    "post": { "x-policy-action": "create", "x-policy-role": ["librarian", "archivist"] }
                },
                "/docs/{id}": {
                    "x-policy-resource": "document",
                    "x-policy-relation": {
                        "subject_resource": "document",
                        "object_resource": "folder",
                        "key": "parent"
                    },
                    "get": {
                        "x-policy-resource-role": "maintainer",
                        "x-policy-derived-role": {
                            "base_role": "collaborator",
                            "derived_role": "reader",
                            "relation": "parent"
                        }
                    }
                }
            }
        }"#,
    )
    .expect("fixture document must parse")
}
