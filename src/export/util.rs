//! Shared rendering helpers for the HCL generators.

use crate::ident::sanitize_parts;
use crate::store::Scope;

/// Builds a block identifier from one or more raw parts.
pub(crate) fn safe_block_id(parts: &[&str]) -> String {
    sanitize_parts(parts)
}

/// Decodes the HTML entities the remote store escapes free text with.
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Escapes a string for embedding in a double-quoted HCL value.
pub(crate) fn escape_hcl(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Entity free text arrives HTML-escaped; decode it, then re-escape for HCL.
pub(crate) fn prepare_text(text: &str) -> String {
    escape_hcl(&decode_entities(text))
}

/// Renders a `depends_on` list, or nothing for an empty one.
pub(crate) fn render_depends_on(deps: &[String]) -> String {
    if deps.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n  depends_on = [\n");
    for dep in deps {
        out.push_str("    ");
        out.push_str(dep);
        out.push_str(",\n");
    }
    out.push_str("  ]");
    out
}

/// The artifact header: scope comment plus the provider block.
pub(crate) fn header(scope: &Scope) -> String {
    format!(
        r#"# Generated by policysync
# Environment: {environment}
# Project: {project}
# Organization: {organization}

terraform {{
  required_providers {{
    policysync = {{
      source  = "policysync/policysync"
      version = "~> 0.1"
    }}
  }}
}}

variable "POLICYSYNC_API_KEY" {{
  type        = string
  description = "API key for the policy service"
}}

provider "policysync" {{
  api_key = var.POLICYSYNC_API_KEY
}}
"#,
        environment = scope.environment,
        project = scope.project,
        organization = scope.organization,
    )
}
