//! Role block generation.
//!
//! Roles come from two places: environment-level roles and roles scoped to
//! a resource. Both land in `policysync_role` blocks, so block ids must be
//! deduplicated: a role key used by several resources (or shadowing a
//! reserved default) gets a `resource__role` id. The id map built here is
//! shared with the derivation generator so its references agree.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::export::util::{prepare_text, render_depends_on, safe_block_id};
use crate::store::{PolicyStore, Scope};
use crate::types::{USER_RESOURCE_KEY, RESERVED_ROLE_KEYS};

/// Maps `role` and `resource:role` keys to their block ids.
pub(crate) type RoleIdMap = BTreeMap<String, String>;

struct RoleBlock {
    id: String,
    key: String,
    name: String,
    description: Option<String>,
    resource: Option<String>,
    permissions: Vec<String>,
    extends: Vec<String>,
    dependencies: Vec<String>,
}

pub(crate) async fn generate(
    store: &dyn PolicyStore,
    scope: &Scope,
) -> (String, RoleIdMap, Vec<String>) {
    let mut warnings = Vec::new();
    let mut id_map = RoleIdMap::new();

    let (roles, resources) = match futures::try_join!(
        store.list_roles(scope),
        store.list_resources(scope),
    ) {
        Ok(pair) => pair,
        Err(e) => {
            warnings.push(format!("Failed to export roles: {}", e));
            return (String::new(), id_map, warnings);
        }
    };

    if roles.is_empty() && resources.is_empty() {
        return (String::new(), id_map, warnings);
    }

    // Count key occurrences across both kinds to spot colliding ids.
    let mut key_count: BTreeMap<&str, usize> = BTreeMap::new();
    for role in &roles {
        *key_count.entry(role.key.as_str()).or_default() += 1;
    }
    for resource in &resources {
        for role_key in resource.roles.keys() {
            *key_count.entry(role_key.as_str()).or_default() += 1;
        }
    }

    let resource_keys: BTreeSet<&str> = resources.iter().map(|r| r.key.as_str()).collect();
    let mut used_ids: BTreeSet<String> = BTreeSet::new();
    let mut blocks: Vec<RoleBlock> = Vec::new();

    // Resource roles first, in resource-key order. BTreeMap iteration keeps
    // the roles within one resource stable too.
    let mut sorted_resources: Vec<_> = resources
        .iter()
        .filter(|r| r.key != USER_RESOURCE_KEY)
        .collect();
    sorted_resources.sort_by(|a, b| a.key.cmp(&b.key));

    for resource in &sorted_resources {
        for (role_key, role) in &resource.roles {
            let duplicate = key_count.get(role_key.as_str()).copied().unwrap_or(0) > 1;
            let reserved = RESERVED_ROLE_KEYS.contains(&role_key.as_str());
            let id = if duplicate || reserved || used_ids.contains(role_key) {
                format!(
                    "{}__{}",
                    safe_block_id(&[&resource.key]),
                    safe_block_id(&[role_key])
                )
            } else {
                safe_block_id(&[role_key])
            };
            used_ids.insert(id.clone());

            id_map.insert(format!("{}:{}", resource.key, role_key), id.clone());
            if !duplicate && !id_map.contains_key(role_key) {
                id_map.insert(role_key.clone(), id.clone());
            }

            blocks.push(RoleBlock {
                id,
                key: role_key.clone(),
                name: role.name.clone(),
                description: role.description.clone(),
                resource: Some(resource.key.clone()),
                permissions: role.permissions.clone(),
                extends: role.extends.clone(),
                dependencies: vec![format!(
                    "policysync_resource.{}",
                    safe_block_id(&[&resource.key])
                )],
            });
        }
    }

    // Environment-level roles. Reserved defaults are never exported but
    // stay in the id map so derivations can still reference them.
    for role in &roles {
        if RESERVED_ROLE_KEYS.contains(&role.key.as_str()) {
            id_map.entry(role.key.clone()).or_insert_with(|| role.key.clone());
            continue;
        }

        let mut id = safe_block_id(&[&role.key]);
        if used_ids.contains(&id) {
            id = safe_block_id(&["global", &role.key]);
        }
        used_ids.insert(id.clone());
        id_map.insert(role.key.clone(), id.clone());

        let mut dependencies = Vec::new();
        for permission in &role.permissions {
            if let Some((resource_key, _)) = permission.split_once(':') {
                if resource_keys.contains(resource_key) {
                    let dep = format!(
                        "policysync_resource.{}",
                        safe_block_id(&[resource_key])
                    );
                    if !dependencies.contains(&dep) {
                        dependencies.push(dep);
                    }
                }
            }
        }

        blocks.push(RoleBlock {
            id,
            key: role.key.clone(),
            name: role.name.clone(),
            description: role.description.clone(),
            resource: None,
            permissions: role.permissions.clone(),
            extends: role.extends.clone(),
            dependencies,
        });
    }

    if blocks.is_empty() {
        return (String::new(), id_map, warnings);
    }

    // Extending a role means depending on its block.
    let ids = &id_map;
    let extend_deps: Vec<(usize, String)> = blocks
        .iter()
        .enumerate()
        .flat_map(|(i, block)| {
            block.extends.iter().filter_map(move |extended| {
                let scoped = block
                    .resource
                    .as_ref()
                    .and_then(|r| ids.get(&format!("{}:{}", r, extended)));
                scoped
                    .or_else(|| ids.get(extended))
                    .map(|id| (i, format!("policysync_role.{}", id)))
            })
        })
        .collect();
    for (i, dep) in extend_deps {
        if !blocks[i].dependencies.contains(&dep) {
            blocks[i].dependencies.push(dep);
        }
    }

    let mut hcl = String::from("\n# Roles\n");
    for block in &blocks {
        render_role(&mut hcl, block);
    }
    (hcl, id_map, warnings)
}

fn render_role(out: &mut String, block: &RoleBlock) {
    let _ = write!(
        out,
        "resource \"policysync_role\" \"{id}\" {{\n  key  = \"{key}\"\n  name = \"{name}\"",
        id = block.id,
        key = block.key,
        name = prepare_text(&block.name),
    );
    if let Some(description) = &block.description {
        let _ = write!(out, "\n  description = \"{}\"", prepare_text(description));
    }
    if let Some(resource) = &block.resource {
        let _ = write!(
            out,
            "\n  resource = policysync_resource.{}.key",
            safe_block_id(&[resource])
        );
    }
    let _ = write!(out, "\n  permissions = {}", render_string_list(&block.permissions));
    if !block.extends.is_empty() {
        let _ = write!(out, "\n  extends = {}", render_string_list(&block.extends));
    }
    out.push_str(&render_depends_on(&block.dependencies));
    out.push_str("\n}\n");
}

fn render_string_list(items: &[String]) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }
    let quoted: Vec<String> = items
        .iter()
        .map(|item| format!("\"{}\"", prepare_text(item)))
        .collect();
    format!("[{}]", quoted.join(", "))
}
