//! User-attribute block generation.
//!
//! User attributes live on the internal `__user` resource. Built-in
//! attributes are recognized by their descriptions and skipped.

use std::fmt::Write;

use crate::error::ErrorKind;
use crate::export::util::prepare_text;
use crate::ident::sanitize_key;
use crate::store::{PolicyStore, Scope};
use crate::types::{AttributeType, USER_RESOURCE_KEY};

pub(crate) async fn generate(
    store: &dyn PolicyStore,
    scope: &Scope,
) -> (String, Vec<String>) {
    let mut warnings = Vec::new();
    let resource = match store.get_resource(scope, USER_RESOURCE_KEY).await {
        Ok(resource) => resource,
        Err(e) if e.kind() == ErrorKind::NotFound => return (String::new(), warnings),
        Err(e) => {
            warnings.push(format!("Failed to export user attributes: {}", e));
            return (String::new(), warnings);
        }
    };

    let custom: Vec<_> = resource
        .attributes
        .iter()
        .filter(|(_, attr)| {
            !attr
                .description
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains("built in attribute")
        })
        .collect();
    if custom.is_empty() {
        return (String::new(), warnings);
    }

    let mut hcl = String::from("\n# User Attributes\n");
    for (key, attr) in custom {
        let _ = write!(
            hcl,
            "resource \"policysync_user_attribute\" \"user_{id}\" {{\n  key  = \"{key}\"\n  type = \"{ty}\"",
            id = sanitize_key(&key.to_lowercase()),
            key = key,
            ty = normalize_type(attr.attr_type),
        );
        if let Some(description) = &attr.description {
            let _ = write!(hcl, "\n  description = \"{}\"", prepare_text(description));
        }
        hcl.push_str("\n}\n");
    }
    (hcl, warnings)
}

/// Maps model attribute types onto the output format's narrower set.
fn normalize_type(ty: AttributeType) -> &'static str {
    match ty {
        AttributeType::String | AttributeType::Time => "string",
        AttributeType::Number => "number",
        AttributeType::Boolean => "bool",
        AttributeType::Array | AttributeType::ObjectArray => "array",
        AttributeType::Json | AttributeType::Object => "json",
    }
}
