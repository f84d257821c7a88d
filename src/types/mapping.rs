//! API routing-rule types.

use serde::{Deserialize, Serialize};

/// One routing rule: a URL pattern and HTTP method mapped to a
/// resource/action pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlMapping {
    /// Absolute or relative URL pattern.
    pub url: String,
    /// Lowercased HTTP method name.
    pub http_method: String,
    /// Resource key the rule maps to.
    pub resource: String,
    /// Action key the rule maps to.
    pub action: String,
}

/// A namespaced batch of routing rules.
///
/// Ingestion replaces the whole config under its namespace key in one
/// delete-then-create step rather than diffing individual rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Namespace key of the config.
    pub key: String,
    /// Display name.
    pub name: String,
    /// The full rule set for this namespace.
    pub mapping_rules: Vec<UrlMapping>,
    /// Auth mechanism the proxy should apply (`Bearer`, `Basic`, `Headers`).
    pub auth_mechanism: String,
    /// Secret or token header the proxy should use.
    pub secret: String,
}
