//! User-set and resource-set block generation.
//!
//! Condition sets come back from the store as one list; the two generators
//! here split them by type. Conditions are an arbitrary predicate tree and
//! are embedded as an escaped JSON string.

use std::fmt::Write;

use crate::export::util::{escape_hcl, prepare_text, safe_block_id};
use crate::store::{PolicyStore, Scope};
use crate::types::{ConditionSet, ConditionSetType};

pub(crate) async fn generate_user_sets(
    store: &dyn PolicyStore,
    scope: &Scope,
) -> (String, Vec<String>) {
    generate(store, scope, ConditionSetType::UserSet, "\n# User Sets\n").await
}

pub(crate) async fn generate_resource_sets(
    store: &dyn PolicyStore,
    scope: &Scope,
) -> (String, Vec<String>) {
    generate(
        store,
        scope,
        ConditionSetType::ResourceSet,
        "\n# Resource Sets\n",
    )
    .await
}

async fn generate(
    store: &dyn PolicyStore,
    scope: &Scope,
    set_type: ConditionSetType,
    header: &str,
) -> (String, Vec<String>) {
    let mut warnings = Vec::new();
    let label = match set_type {
        ConditionSetType::UserSet => "user sets",
        ConditionSetType::ResourceSet => "resource sets",
    };

    let sets = match store.list_condition_sets(scope).await {
        Ok(sets) => sets,
        Err(e) => {
            warnings.push(format!("Failed to export {}: {}", label, e));
            return (String::new(), warnings);
        }
    };

    let matching: Vec<&ConditionSet> = sets.iter().filter(|s| s.set_type == set_type).collect();
    if matching.is_empty() {
        return (String::new(), warnings);
    }

    let block_type = match set_type {
        ConditionSetType::UserSet => "policysync_user_set",
        ConditionSetType::ResourceSet => "policysync_resource_set",
    };

    let mut hcl = String::from(header);
    for set in matching {
        let conditions = match &set.conditions {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let _ = write!(
            hcl,
            "resource \"{block_type}\" \"{id}\" {{\n  key  = \"{key}\"\n  name = \"{name}\"",
            block_type = block_type,
            id = safe_block_id(&[&set.key]),
            key = set.key,
            name = prepare_text(&set.name),
        );
        if let Some(description) = &set.description {
            let _ = write!(hcl, "\n  description = \"{}\"", prepare_text(description));
        }
        let _ = write!(hcl, "\n  conditions = \"{}\"", escape_hcl(&conditions));
        if let Some(resource_id) = &set.resource_id {
            let _ = write!(hcl, "\n  resource = \"{}\"", prepare_text(resource_id));
        }
        hcl.push_str("\n}\n");
    }
    (hcl, warnings)
}
