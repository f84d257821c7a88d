//! Role-derivation block generation.
//!
//! Derivations are read off resource roles' grant rules. Their blocks
//! reference role and relation blocks emitted by the other generators, so
//! this one consumes the id maps those generators built and declares the
//! full dependency list explicitly.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::export::relations::RelationIdMap;
use crate::export::roles::RoleIdMap;
use crate::export::util::{render_depends_on, safe_block_id};
use crate::store::{PolicyStore, Scope};
use crate::types::{GrantRule, RESERVED_ROLE_KEYS, USER_RESOURCE_KEY};

struct DerivationBlock {
    id: String,
    role: String,
    on_resource: String,
    to_role: String,
    resource: String,
    linked_by: String,
    dependencies: Vec<String>,
}

pub(crate) async fn generate(
    store: &dyn PolicyStore,
    scope: &Scope,
    role_ids: &RoleIdMap,
    relation_ids: &RelationIdMap,
) -> (String, Vec<String>) {
    let mut warnings = Vec::new();

    let resources = match store.list_resources(scope).await {
        Ok(resources) => resources,
        Err(e) => {
            warnings.push(format!("Failed to export role derivations: {}", e));
            return (String::new(), warnings);
        }
    };

    let mut blocks: Vec<DerivationBlock> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for resource in resources.iter().filter(|r| r.key != USER_RESOURCE_KEY) {
        let roles = match store.list_resource_roles(scope, &resource.key).await {
            Ok(roles) => roles,
            Err(e) => {
                warnings.push(format!(
                    "Failed to process roles for resource '{}': {}",
                    resource.key, e
                ));
                continue;
            }
        };

        for role in &roles {
            let Some(granted_to) = &role.granted_to else {
                continue;
            };
            for grant in &granted_to.users_with_role {
                match build_block(
                    grant,
                    &role.key,
                    &resource.key,
                    role_ids,
                    relation_ids,
                    &mut warnings,
                ) {
                    Some(block) if seen.insert(block.id.clone()) => blocks.push(block),
                    _ => {}
                }
            }
        }
    }

    if blocks.is_empty() {
        return (String::new(), warnings);
    }

    let mut hcl = String::from("\n# Role Derivations\n");
    for block in &blocks {
        let _ = write!(
            hcl,
            "resource \"policysync_role_derivation\" \"{id}\" {{\n  role        = policysync_role.{role}.key\n  on_resource = policysync_resource.{on_resource}.key\n  to_role     = policysync_role.{to_role}.key\n  resource    = policysync_resource.{resource}.key\n  linked_by   = policysync_relation.{linked_by}.key{deps}\n}}\n",
            id = block.id,
            role = block.role,
            on_resource = safe_block_id(&[&block.on_resource]),
            to_role = block.to_role,
            resource = safe_block_id(&[&block.resource]),
            linked_by = block.linked_by,
            deps = render_depends_on(&block.dependencies),
        );
    }
    (hcl, warnings)
}

fn build_block(
    grant: &GrantRule,
    derived_role_key: &str,
    subject_resource: &str,
    role_ids: &RoleIdMap,
    relation_ids: &RelationIdMap,
    warnings: &mut Vec<String>,
) -> Option<DerivationBlock> {
    if grant.role.is_empty() || grant.on_resource.is_empty() || grant.linked_by_relation.is_empty()
    {
        warnings.push(format!(
            "Skipping incomplete grant rule on role '{}'",
            derived_role_key
        ));
        return None;
    }

    let linked_by = find_relation_id(
        &grant.on_resource,
        subject_resource,
        &grant.linked_by_relation,
        relation_ids,
    );
    let Some(linked_by) = linked_by else {
        warnings.push(format!(
            "Could not determine relation block for {} ({}) -> {} ({}) via {}",
            grant.role,
            grant.on_resource,
            derived_role_key,
            subject_resource,
            grant.linked_by_relation
        ));
        return None;
    };

    let role = role_block_id(&grant.role, &grant.on_resource, role_ids, warnings);
    let to_role = role_block_id(derived_role_key, subject_resource, role_ids, warnings);

    let dependencies = vec![
        format!("policysync_role.{}", role),
        format!("policysync_resource.{}", safe_block_id(&[&grant.on_resource])),
        format!("policysync_role.{}", to_role),
        format!("policysync_resource.{}", safe_block_id(&[subject_resource])),
        format!("policysync_relation.{}", linked_by),
    ];

    Some(DerivationBlock {
        id: format!(
            "{}_{}_to_{}_{}",
            safe_block_id(&[&grant.on_resource]),
            safe_block_id(&[&grant.role]),
            safe_block_id(&[subject_resource]),
            safe_block_id(&[derived_role_key]),
        ),
        role,
        on_resource: grant.on_resource.clone(),
        to_role,
        resource: subject_resource.to_string(),
        linked_by,
        dependencies,
    })
}

/// Resolves a role key to the block id the role generator assigned it.
fn role_block_id(
    role_key: &str,
    resource_key: &str,
    role_ids: &RoleIdMap,
    warnings: &mut Vec<String>,
) -> String {
    if let Some(id) = role_ids.get(&format!("{}:{}", resource_key, role_key)) {
        return id.clone();
    }
    if let Some(id) = role_ids.get(role_key) {
        return id.clone();
    }
    if !RESERVED_ROLE_KEYS.contains(&role_key) {
        warnings.push(format!(
            "Role block not found for {} on resource {}, using fallback",
            role_key, resource_key
        ));
    }
    format!(
        "{}__{}",
        safe_block_id(&[resource_key]),
        safe_block_id(&[role_key])
    )
}

/// Finds the relation block connecting two resources, in either direction.
fn find_relation_id(
    source_resource: &str,
    target_resource: &str,
    relation_key: &str,
    relation_ids: &RelationIdMap,
) -> Option<String> {
    let direct = format!("{}:{}:{}", source_resource, relation_key, target_resource);
    if let Some(id) = relation_ids.get(&direct) {
        return Some(id.clone());
    }
    let reverse = format!("{}:{}:{}", target_resource, relation_key, source_resource);
    if let Some(id) = relation_ids.get(&reverse) {
        return Some(id.clone());
    }
    // Last resort: same relation key between the same endpoints under any
    // key spelling the map happens to hold.
    relation_ids.iter().find_map(|(key, id)| {
        let mut parts = key.splitn(3, ':');
        let subject = parts.next()?;
        let relation = parts.next()?;
        let object = parts.next()?;
        let endpoints_match = (subject == source_resource && object == target_resource)
            || (subject == target_resource && object == source_resource);
        (relation == relation_key && endpoints_match).then(|| id.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{relations, roles};
    use crate::store::InMemoryPolicyStore;
    use crate::types::{
        DerivationGrant, RelationCreate, ResourceCreate, ResourceRoleCreate, ResourceRoleUpdate,
    };

    fn scope() -> Scope {
        Scope::new("acme", "storefront", "dev")
    }

    async fn seeded_store() -> InMemoryPolicyStore {
        let store = InMemoryPolicyStore::new();
        for key in ["document", "folder"] {
            store
                .create_resource(&scope(), &ResourceCreate::new(key, key))
                .await
                .unwrap();
        }
        store
            .create_relation(
                &scope(),
                "document",
                &RelationCreate {
                    key: "parent".into(),
                    name: "Parent".into(),
                    description: None,
                    object_resource: "folder".into(),
                },
            )
            .await
            .unwrap();
        store
            .create_resource_role(
                &scope(),
                "document",
                &ResourceRoleCreate::new("reader", "Reader"),
            )
            .await
            .unwrap();
        store
            .create_resource_role(
                &scope(),
                "folder",
                &ResourceRoleCreate::new("viewer", "Viewer"),
            )
            .await
            .unwrap();
        store
            .update_resource_role(
                &scope(),
                "document",
                "reader",
                &ResourceRoleUpdate {
                    permissions: None,
                    granted_to: Some(DerivationGrant {
                        users_with_role: vec![GrantRule {
                            role: "viewer".into(),
                            on_resource: "folder".into(),
                            linked_by_relation: "parent".into(),
                        }],
                    }),
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn no_grants_is_empty_string() {
        let store = InMemoryPolicyStore::new();
        store
            .create_resource(&scope(), &ResourceCreate::new("document", "Document"))
            .await
            .unwrap();
        let (hcl, warnings) =
            generate(&store, &scope(), &RoleIdMap::new(), &RelationIdMap::new()).await;
        assert_eq!(hcl, "");
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn renders_full_dependency_list() {
        let store = seeded_store().await;
        let (_, role_ids, _) = roles::generate(&store, &scope()).await;
        let (_, relation_ids, _) = relations::generate(&store, &scope()).await;

        let (hcl, warnings) = generate(&store, &scope(), &role_ids, &relation_ids).await;
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
        assert!(hcl.contains(
            "resource \"policysync_role_derivation\" \"folder_viewer_to_document_reader\""
        ));
        // "viewer" is a reserved key, so its block id is resource-scoped
        assert!(hcl.contains("role        = policysync_role.folder__viewer.key"));
        assert!(hcl.contains("to_role     = policysync_role.reader.key"));
        assert!(hcl.contains("linked_by   = policysync_relation.parent.key"));
        for dep in [
            "policysync_role.folder__viewer,",
            "policysync_resource.folder,",
            "policysync_role.reader,",
            "policysync_resource.document,",
            "policysync_relation.parent,",
        ] {
            assert!(hcl.contains(dep), "missing dependency {}", dep);
        }
    }
}
