//! Ingest-then-export flows.

use policysync::prelude::*;

use crate::common::{full_document, pipeline, scope, store};

#[tokio::test]
async fn export_of_empty_environment_has_no_sections() {
    let store = store();
    let output = Exporter::new(store).export(&scope()).await;

    assert!(output.hcl.starts_with("# Generated by policysync"));
    for section in [
        "# Resources",
        "# User Attributes",
        "# Roles",
        "# Resource Relations",
        "# User Sets",
        "# Resource Sets",
        "# Role Derivations",
    ] {
        assert!(
            !output.hcl.contains(section),
            "unexpected section {} in empty export",
            section
        );
    }
    assert!(output.warnings.is_empty());
}

#[tokio::test]
async fn ingested_model_round_trips_into_hcl() {
    let store = store();
    let report = pipeline(store.clone()).ingest(&scope(), &full_document()).await;
    assert_eq!(report.status(), IngestStatus::Success);

    let output = Exporter::new(store).export(&scope()).await;
    let hcl = &output.hcl;

    assert!(hcl.contains("resource \"policysync_resource\" \"document\""));
    assert!(hcl.contains("resource \"policysync_resource\" \"folder\""));
    assert!(hcl.contains("resource \"policysync_role\" \"librarian\""));
    assert!(hcl.contains("resource \"policysync_relation\" \"parent\""));
    assert!(hcl.contains("subject_resource = policysync_resource.document.key"));
    assert!(hcl.contains(
        "resource \"policysync_role_derivation\" \"folder_collaborator_to_document_reader\""
    ));
    assert!(hcl.contains("policysync_relation.parent,"));

    // sections in their fixed order
    let order = [
        "# Resources",
        "# Roles",
        "# Resource Relations",
        "# Role Derivations",
    ];
    let mut last = 0;
    for section in order {
        let at = hcl.find(section).unwrap_or_else(|| panic!("missing {}", section));
        assert!(at > last, "{} out of order", section);
        last = at;
    }
}

#[tokio::test]
async fn descriptions_with_escaped_quotes_render_cleanly() {
    let store = store();
    let mut body = policysync::types::ResourceCreate::new("document", "Document");
    body.description = Some("A &quot;versioned&quot; record".to_string());
    store.create_resource(&scope(), &body).await.unwrap();

    let output = Exporter::new(store).export(&scope()).await;
    assert!(output
        .hcl
        .contains("description = \"A \\\"versioned\\\" record\""));
}

#[tokio::test]
async fn condition_sets_export_into_their_own_sections() {
    let store = store();
    store.seed_condition_set(
        &scope(),
        ConditionSet {
            key: "legal_users".into(),
            name: "Legal users".into(),
            set_type: ConditionSetType::UserSet,
            description: None,
            conditions: serde_json::json!({
                "allOf": [{ "user.department": { "equals": "legal" } }]
            }),
            resource_id: None,
        },
    );

    let output = Exporter::new(store).export(&scope()).await;
    assert!(output.hcl.contains("# User Sets"));
    assert!(output.hcl.contains("resource \"policysync_user_set\" \"legal_users\""));
    assert!(!output.hcl.contains("# Resource Sets"));
}
