//! Annotated API-specification document model.
//!
//! Ingestion reads OpenAPI-shaped JSON documents whose paths and
//! operations carry `x-policy-*` extension fields. Only the parts the
//! pipeline acts on are modeled; everything else in the document is
//! ignored during deserialization.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, ErrorKind, Result};

/// A parsed specification document.
///
/// Paths are kept in a `BTreeMap` so ingestion walks them in a stable
/// order; reports and generated routing rules come out deterministic
/// regardless of the document's on-disk ordering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecDocument {
    /// Server entries; the first one's URL prefixes routing-rule URLs.
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Path templates mapped to their operations.
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
}

impl SpecDocument {
    /// Parses a document from raw JSON text.
    ///
    /// Malformed JSON or a structurally invalid document is
    /// [`ErrorKind::Parse`], which aborts the whole ingestion run.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            Error::new(
                ErrorKind::Parse,
                format!("invalid specification document: {}", e),
            )
        })
    }

    /// Parses a document from an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            Error::new(
                ErrorKind::Parse,
                format!("invalid specification document: {}", e),
            )
        })
    }

    /// The base URL routing rules are prefixed with, if the document
    /// declares any server.
    pub fn base_url(&self) -> Option<&str> {
        self.servers.first().map(|s| s.url.as_str())
    }
}

/// One entry of the document's `servers` array.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    /// Base URL of the API.
    pub url: String,
}

/// One path template and its operations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    /// Resource this path's operations belong to.
    #[serde(rename = "x-policy-resource")]
    pub resource: Option<String>,
    /// Path-level relation declaration, shared by all operations.
    #[serde(rename = "x-policy-relation")]
    pub relation: Option<RelationAnnotation>,

    /// GET operation, if the path declares one.
    pub get: Option<Operation>,
    /// PUT operation, if the path declares one.
    pub put: Option<Operation>,
    /// POST operation, if the path declares one.
    pub post: Option<Operation>,
    /// DELETE operation, if the path declares one.
    pub delete: Option<Operation>,
    /// OPTIONS operation, if the path declares one.
    pub options: Option<Operation>,
    /// HEAD operation, if the path declares one.
    pub head: Option<Operation>,
    /// PATCH operation, if the path declares one.
    pub patch: Option<Operation>,
}

impl PathItem {
    /// The operations present on this path, paired with their lowercase
    /// HTTP method names, in a fixed order.
    pub fn operations(&self) -> impl Iterator<Item = (&'static str, &Operation)> {
        [
            ("get", &self.get),
            ("put", &self.put),
            ("post", &self.post),
            ("delete", &self.delete),
            ("options", &self.options),
            ("head", &self.head),
            ("patch", &self.patch),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }
}

/// One HTTP operation and its policy annotations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    /// Human-readable summary; used as the action display name when set.
    pub summary: Option<String>,
    /// Action key override; defaults to the HTTP method name.
    #[serde(rename = "x-policy-action")]
    pub action: Option<String>,
    /// Role(s) to grant this operation's permission to.
    #[serde(rename = "x-policy-role")]
    pub roles: Option<RoleAnnotation>,
    /// Role scoped to this operation's resource.
    #[serde(rename = "x-policy-resource-role")]
    pub resource_role: Option<String>,
    /// Relation declaration specific to this operation.
    #[serde(rename = "x-policy-relation")]
    pub relation: Option<RelationAnnotation>,
    /// Derived-role declaration wired up in phase four.
    #[serde(rename = "x-policy-derived-role")]
    pub derived_role: Option<DerivedRoleAnnotation>,
}

/// A role annotation, written as either one key or a list of keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoleAnnotation {
    /// A single role key.
    One(String),
    /// Several role keys sharing the same permission.
    Many(Vec<String>),
}

impl RoleAnnotation {
    /// The annotated keys as a slice, regardless of spelling.
    pub fn keys(&self) -> &[String] {
        match self {
            RoleAnnotation::One(key) => std::slice::from_ref(key),
            RoleAnnotation::Many(keys) => keys,
        }
    }
}

/// A relation declaration between two resources.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationAnnotation {
    /// Resource the relation hangs off.
    pub subject_resource: String,
    /// Resource the relation points at.
    pub object_resource: String,
    /// Relation key; defaults to `parent` when omitted.
    pub key: Option<String>,
    /// Display name; defaults to the capitalized key.
    pub name: Option<String>,
}

/// A derived-role declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct DerivedRoleAnnotation {
    /// Role the principal must already hold on the related resource.
    pub base_role: String,
    /// Role granted on the annotated resource.
    pub derived_role: String,
    /// Subject resource; defaults to the path's resource.
    pub resource: Option<String>,
    /// Key of the relation to derive through; first listed wins if omitted.
    pub relation: Option<String>,
}
