//! Resource, action, and attribute types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::role::ResourceRole;

/// Reserved key of the store's internal principal resource.
///
/// The store models user attributes as attributes of this resource. It is
/// never exported as a regular resource block and never migrated.
pub const USER_RESOURCE_KEY: &str = "__user";

/// A resource type in the policy model.
///
/// Read shape returned by list/get operations. `actions`, `attributes`,
/// `relations`, and `roles` are keyed maps owned by the resource; `relations`
/// maps relation key to the object resource key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique key within the environment.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional uniform resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    /// Actions that may be performed on this resource.
    #[serde(default)]
    pub actions: BTreeMap<String, ActionSpec>,
    /// Attributes declared on this resource.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSpec>,
    /// Relations declared on this resource, keyed by relation key, with the
    /// object resource key as value.
    #[serde(default)]
    pub relations: BTreeMap<String, String>,
    /// Resource-scoped roles, keyed by role key.
    #[serde(default)]
    pub roles: BTreeMap<String, ResourceRole>,
}

/// An action owned by exactly one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ActionSpec {
    /// Creates an action whose display name equals its key.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// The fixed enumeration of attribute value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 text.
    String,
    /// Numeric value.
    Number,
    /// Boolean flag.
    #[serde(rename = "bool")]
    Boolean,
    /// Timestamp.
    Time,
    /// Arbitrary JSON value.
    Json,
    /// Homogeneous array.
    Array,
    /// JSON object.
    Object,
    /// Array of JSON objects.
    ObjectArray,
}

impl AttributeType {
    /// Returns the wire name of this attribute type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Boolean => "bool",
            AttributeType::Time => "time",
            AttributeType::Json => "json",
            AttributeType::Array => "array",
            AttributeType::Object => "object",
            AttributeType::ObjectArray => "object_array",
        }
    }
}

/// An attribute owned by exactly one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Value type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payload for creating a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCreate {
    /// Unique key within the environment.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Actions to create with the resource.
    #[serde(default)]
    pub actions: BTreeMap<String, ActionSpec>,
    /// Attributes to create with the resource.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSpec>,
}

impl ResourceCreate {
    /// Creates a minimal payload with empty action and attribute maps.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: None,
            actions: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial payload for updating a resource (merge semantics).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUpdate {
    /// New display name, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement action map, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<BTreeMap<String, ActionSpec>>,
    /// Replacement attribute map, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, AttributeSpec>>,
}
