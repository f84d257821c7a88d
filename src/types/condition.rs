//! Condition set types (user-sets and resource-sets).

use serde::{Deserialize, Serialize};

/// Discriminates user-sets from resource-sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionSetType {
    /// A set of principals scoped by attribute conditions.
    #[serde(rename = "userset")]
    UserSet,
    /// A set of resource instances scoped by attribute conditions.
    #[serde(rename = "resourceset")]
    ResourceSet,
}

/// A named predicate over attribute conditions.
///
/// `conditions` is a nested boolean expression tree; the engine treats it as
/// opaque JSON and only serializes it into exported blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSet {
    /// Unique key within the environment.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Whether this set scopes users or resources.
    #[serde(rename = "type")]
    pub set_type: ConditionSetType,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested boolean expression tree over attribute predicates.
    pub conditions: serde_json::Value,
    /// Owning resource key, present only for resource-sets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}
