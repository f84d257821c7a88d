//! Role types, including the structured derivation grant rule.

use serde::{Deserialize, Serialize};

/// Role keys that exist in every environment by default.
///
/// Ingestion never creates these (it only merges permissions into them), and
/// export never emits blocks for them.
pub const RESERVED_ROLE_KEYS: &[&str] = &["admin", "editor", "viewer"];

/// A top-level (environment-wide) role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique key within the environment.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Permission strings of the form `resource:action`.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Keys of roles this role extends.
    #[serde(default)]
    pub extends: Vec<String>,
}

/// Payload for creating a top-level role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCreate {
    /// Unique key within the environment.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial permission strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl RoleCreate {
    /// Creates a role payload with no permissions.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: None,
            permissions: Vec::new(),
        }
    }

    /// Sets the initial permission list.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Partial payload for updating a top-level role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    /// New display name, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement permission list, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

/// A role scoped to a single resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRole {
    /// Role key, unique within the owning resource.
    #[serde(default)]
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Permission strings of the form `resource:action`.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Keys of roles this role extends.
    #[serde(default)]
    pub extends: Vec<String>,
    /// The structured grant rule, when this role is a derivation target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_to: Option<DerivationGrant>,
}

/// Payload for creating a resource-scoped role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRoleCreate {
    /// Role key, unique within the owning resource.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial permission strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl ResourceRoleCreate {
    /// Creates a resource-role payload with no permissions.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: None,
            permissions: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the initial permission list.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Partial payload for updating a resource-scoped role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRoleUpdate {
    /// Replacement permission list, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    /// Replacement grant rule, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_to: Option<DerivationGrant>,
}

/// The structured grant rule attached to a derived role.
///
/// Grants the owning role to every principal matching one of the
/// `users_with_role` rules, regardless of whether they also hold a direct
/// role on the object resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationGrant {
    /// Rules granting through a role held on a related resource.
    pub users_with_role: Vec<GrantRule>,
}

/// One derivation rule: holders of `role` on `on_resource`, reached through
/// `linked_by_relation`, receive the owning role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRule {
    /// Base role the principal must hold.
    pub role: String,
    /// Resource the base role is held on.
    pub on_resource: String,
    /// Relation key linking subject and object resources.
    pub linked_by_relation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_rule_wire_shape() {
        let grant = DerivationGrant {
            users_with_role: vec![GrantRule {
                role: "viewer".into(),
                on_resource: "folder".into(),
                linked_by_relation: "parent".into(),
            }],
        };
        let json = serde_json::to_value(&grant).unwrap();
        assert_eq!(
            json["users_with_role"][0]["linked_by_relation"],
            "parent"
        );
    }

    #[test]
    fn test_role_deserializes_without_permissions() {
        let role: Role = serde_json::from_str(r#"{"key":"editor","name":"Editor"}"#).unwrap();
        assert!(role.permissions.is_empty());
        assert!(role.extends.is_empty());
    }

    #[test]
    fn test_reserved_role_keys() {
        assert!(RESERVED_ROLE_KEYS.contains(&"admin"));
        assert!(!RESERVED_ROLE_KEYS.contains(&"owner"));
    }
}
