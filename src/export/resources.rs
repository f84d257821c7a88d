//! Resource block generation.

use std::fmt::Write;

use crate::export::util::{prepare_text, safe_block_id};
use crate::store::{PolicyStore, Scope};
use crate::types::{Resource, USER_RESOURCE_KEY};

/// Renders one `policysync_resource` block per non-internal resource.
/// Zero resources yields exactly the empty string.
pub(crate) async fn generate(
    store: &dyn PolicyStore,
    scope: &Scope,
) -> (String, Vec<String>) {
    let mut warnings = Vec::new();
    let resources = match store.list_resources(scope).await {
        Ok(resources) => resources,
        Err(e) => {
            warnings.push(format!("Failed to export resources: {}", e));
            return (String::new(), warnings);
        }
    };

    let valid: Vec<&Resource> = resources
        .iter()
        .filter(|r| r.key != USER_RESOURCE_KEY)
        .collect();
    if valid.is_empty() {
        return (String::new(), warnings);
    }

    let mut hcl = String::from("\n# Resources\n");
    for resource in valid {
        render_resource(&mut hcl, resource);
    }
    (hcl, warnings)
}

fn render_resource(out: &mut String, resource: &Resource) {
    let _ = write!(
        out,
        "resource \"policysync_resource\" \"{id}\" {{\n  key  = \"{key}\"\n  name = \"{name}\"",
        id = safe_block_id(&[&resource.key]),
        key = resource.key,
        name = prepare_text(&resource.name),
    );
    if let Some(description) = &resource.description {
        let _ = write!(out, "\n  description = \"{}\"", prepare_text(description));
    }
    if let Some(urn) = &resource.urn {
        let _ = write!(out, "\n  urn = \"{}\"", prepare_text(urn));
    }

    out.push_str("\n  actions = {");
    for (action_key, action) in &resource.actions {
        let _ = write!(
            out,
            "\n    \"{key}\" = {{\n      name = \"{name}\"",
            key = action_key,
            name = prepare_text(&action.name),
        );
        if let Some(description) = &action.description {
            let _ = write!(
                out,
                "\n      description = \"{}\"",
                prepare_text(description)
            );
        }
        out.push_str("\n    }");
    }
    out.push_str("\n  }");

    if !resource.attributes.is_empty() {
        out.push_str("\n  attributes = {");
        for (attr_key, attr) in &resource.attributes {
            let _ = write!(
                out,
                "\n    \"{key}\" = {{\n      type = \"{ty}\"",
                key = attr_key,
                ty = attr.attr_type.as_str(),
            );
            if let Some(description) = &attr.description {
                let _ = write!(
                    out,
                    "\n      description = \"{}\"",
                    prepare_text(description)
                );
            }
            out.push_str("\n    }");
        }
        out.push_str("\n  }");
    }
    out.push_str("\n}\n");
}
