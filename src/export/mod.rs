//! Declarative artifact export.
//!
//! Renders the live policy model into a block-structured HCL artifact:
//! one generator per entity kind, each fetching remote state and mapping
//! it to blocks with sanitized ids and explicit dependencies. A failed
//! generator contributes an empty section and a warning; the rest of the
//! export still completes.

mod condition_sets;
mod derivations;
mod relations;
mod resources;
mod roles;
mod user_attributes;
mod util;

use std::sync::Arc;

use tracing::debug;

use crate::store::{PolicyStore, Scope};

/// The rendered artifact plus everything that went sideways producing it.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// The concatenated HCL text.
    pub hcl: String,
    /// Warnings from generators that failed or skipped entities.
    pub warnings: Vec<String>,
}

/// Renders an environment's policy model to HCL.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use policysync::{Exporter, InMemoryPolicyStore, Scope};
///
/// # async fn example() {
/// let store = Arc::new(InMemoryPolicyStore::new());
/// let exporter = Exporter::new(store);
/// let output = exporter.export(&Scope::new("acme", "storefront", "dev")).await;
/// assert!(output.hcl.starts_with("# Generated by policysync"));
/// # }
/// ```
pub struct Exporter {
    store: Arc<dyn PolicyStore>,
}

impl Exporter {
    /// Creates an exporter over the given store.
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// Exports the scoped environment.
    ///
    /// Generators without data dependencies run concurrently; the
    /// derivation generator runs after roles and relations because it
    /// references the block ids they assigned. Sections concatenate in a
    /// fixed order regardless of completion order.
    pub async fn export(&self, scope: &Scope) -> ExportOutput {
        let store = self.store.as_ref();

        let (
            (resources_hcl, resources_warnings),
            (attributes_hcl, attributes_warnings),
            (roles_hcl, role_ids, roles_warnings),
            (relations_hcl, relation_ids, relations_warnings),
            (user_sets_hcl, user_sets_warnings),
            (resource_sets_hcl, resource_sets_warnings),
        ) = futures::join!(
            resources::generate(store, scope),
            user_attributes::generate(store, scope),
            roles::generate(store, scope),
            relations::generate(store, scope),
            condition_sets::generate_user_sets(store, scope),
            condition_sets::generate_resource_sets(store, scope),
        );

        let (derivations_hcl, derivations_warnings) =
            derivations::generate(store, scope, &role_ids, &relation_ids).await;

        let mut hcl = util::header(scope);
        for section in [
            &resources_hcl,
            &attributes_hcl,
            &roles_hcl,
            &relations_hcl,
            &user_sets_hcl,
            &resource_sets_hcl,
            &derivations_hcl,
        ] {
            hcl.push_str(section);
        }

        let mut warnings = Vec::new();
        for batch in [
            resources_warnings,
            attributes_warnings,
            roles_warnings,
            relations_warnings,
            user_sets_warnings,
            resource_sets_warnings,
            derivations_warnings,
        ] {
            warnings.extend(batch);
        }

        debug!(
            bytes = hcl.len(),
            warnings = warnings.len(),
            "export finished"
        );
        ExportOutput { hcl, warnings }
    }
}
