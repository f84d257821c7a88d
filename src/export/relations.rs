//! Relation block generation.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::export::util::{prepare_text, safe_block_id};
use crate::store::{PolicyStore, Scope};
use crate::types::{Relation, USER_RESOURCE_KEY};

/// Maps `subject:key:object` triples to their block ids.
pub(crate) type RelationIdMap = BTreeMap<String, String>;

pub(crate) async fn generate(
    store: &dyn PolicyStore,
    scope: &Scope,
) -> (String, RelationIdMap, Vec<String>) {
    let mut warnings = Vec::new();
    let mut id_map = RelationIdMap::new();

    let resources = match store.list_resources(scope).await {
        Ok(resources) => resources,
        Err(e) => {
            warnings.push(format!("Failed to export relations: {}", e));
            return (String::new(), id_map, warnings);
        }
    };

    let mut all_relations: Vec<Relation> = Vec::new();
    for resource in resources.iter().filter(|r| r.key != USER_RESOURCE_KEY) {
        match store.list_relations(scope, &resource.key).await {
            Ok(relations) => all_relations.extend(relations),
            Err(e) => warnings.push(format!(
                "Failed to fetch relations for resource {}: {}",
                resource.key, e
            )),
        }
    }

    if all_relations.is_empty() {
        return (String::new(), id_map, warnings);
    }

    // One block per relation key; a key reused across resource pairs keeps
    // its first occurrence, matching the dedup the output format needs.
    let mut seen_keys: BTreeMap<String, Relation> = BTreeMap::new();
    for relation in all_relations {
        seen_keys.entry(relation.key.clone()).or_insert(relation);
    }

    let mut hcl = String::from("\n# Resource Relations\n");
    let mut rendered_any = false;
    for relation in seen_keys.values() {
        if relation.key.is_empty()
            || relation.subject_resource.is_empty()
            || relation.object_resource.is_empty()
        {
            warnings.push(format!(
                "Skipping invalid relation with key: {}",
                relation.key
            ));
            continue;
        }
        let id = safe_block_id(&[&relation.key]);
        id_map.insert(relation.map_key(), id.clone());

        let _ = write!(
            hcl,
            "resource \"policysync_relation\" \"{id}\" {{\n  key  = \"{key}\"\n  name = \"{name}\"",
            id = id,
            key = relation.key,
            name = prepare_text(&relation.name),
        );
        if let Some(description) = &relation.description {
            let _ = write!(hcl, "\n  description = \"{}\"", prepare_text(description));
        }
        let _ = write!(
            hcl,
            "\n  subject_resource = policysync_resource.{}.key\n  object_resource  = policysync_resource.{}.key\n}}\n",
            safe_block_id(&[&relation.subject_resource]),
            safe_block_id(&[&relation.object_resource]),
        );
        rendered_any = true;
    }

    if !rendered_any {
        return (String::new(), id_map, warnings);
    }
    (hcl, id_map, warnings)
}
