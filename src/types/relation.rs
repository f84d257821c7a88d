//! Relation types.

use serde::{Deserialize, Serialize};

/// A directed, named association between two resource types.
///
/// Directional: the subject resource acts on or through the object resource
/// (`document parent folder` reads "a document's `parent` is a folder").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation key, unique per ordered resource pair.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Key of the subject resource.
    pub subject_resource: String,
    /// Key of the object resource.
    pub object_resource: String,
}

impl Relation {
    /// Returns the lookup key `subject:relation:object` used to track
    /// relations across ingestion phases and export generators.
    pub fn map_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.subject_resource, self.key, self.object_resource
        )
    }
}

/// Payload for creating a relation under its subject resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationCreate {
    /// Relation key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Key of the object resource.
    pub object_resource: String,
}
