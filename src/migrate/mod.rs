//! Cross-environment resource migration.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::store::{PolicyStore, Scope};
use crate::types::{Resource, ResourceCreate, ResourceUpdate};

/// What to do when a source resource's key already exists in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStrategy {
    /// Update the target resource in place.
    Override,
    /// Count the resource as failed without touching the target (default).
    #[default]
    Fail,
}

/// Summary of one migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrationStats {
    /// Source resources considered.
    pub total: usize,
    /// Resources created or updated in the target.
    pub success: usize,
    /// Resources that conflicted or errored.
    pub failed: usize,
    /// One line per notable event, in processing order.
    pub details: Vec<String>,
}

/// Copies resource entities from one environment's model into another.
///
/// Source and target may be different stores entirely (different
/// organizations, or a live backend and an in-memory one); each side
/// carries its own [`Scope`].
pub struct MigrationEngine {
    source: Arc<dyn PolicyStore>,
    target: Arc<dyn PolicyStore>,
}

impl MigrationEngine {
    /// Creates an engine over a source and a target store.
    pub fn new(source: Arc<dyn PolicyStore>, target: Arc<dyn PolicyStore>) -> Self {
        Self { source, target }
    }

    /// Convenience for migrating between environments of one store.
    pub fn within(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            source: store.clone(),
            target: store,
        }
    }

    /// Migrates every source resource into the target environment.
    ///
    /// Each resource is processed independently; a failure is recorded in
    /// the stats and the batch continues. Listing either side is the only
    /// fatal error.
    pub async fn migrate(
        &self,
        source_scope: &Scope,
        target_scope: &Scope,
        strategy: ConflictStrategy,
    ) -> Result<MigrationStats> {
        let source_resources = self.source.list_resources(source_scope).await?;
        let target_resources = self.target.list_resources(target_scope).await?;

        let mut target_keys: BTreeSet<String> = target_resources
            .into_iter()
            .map(|r| r.key)
            .collect();

        let mut stats = MigrationStats {
            total: source_resources.len(),
            ..MigrationStats::default()
        };

        for resource in &source_resources {
            if target_keys.contains(&resource.key) {
                match strategy {
                    ConflictStrategy::Override => {
                        let update = update_payload(resource);
                        match self
                            .target
                            .update_resource(target_scope, &resource.key, &update)
                            .await
                        {
                            Ok(_) => {
                                stats.success += 1;
                                stats
                                    .details
                                    .push(format!("updated '{}'", resource.key));
                            }
                            Err(e) => {
                                warn!(key = %resource.key, error = %e, "migration update failed");
                                stats.failed += 1;
                                stats.details.push(format!(
                                    "failed to update '{}': {}",
                                    resource.key, e
                                ));
                            }
                        }
                    }
                    ConflictStrategy::Fail => {
                        stats.failed += 1;
                        stats.details.push(format!(
                            "'{}' already exists in target environment",
                            resource.key
                        ));
                    }
                }
                continue;
            }

            match self
                .target
                .create_resource(target_scope, &create_payload(resource))
                .await
            {
                Ok(_) => {
                    stats.success += 1;
                    // Later source entities may reference this key; track it
                    // so they see it as present within this run.
                    target_keys.insert(resource.key.clone());
                    stats.details.push(format!("created '{}'", resource.key));
                }
                Err(e) => {
                    warn!(key = %resource.key, error = %e, "migration create failed");
                    stats.failed += 1;
                    stats
                        .details
                        .push(format!("failed to create '{}': {}", resource.key, e));
                }
            }
        }

        debug!(
            total = stats.total,
            success = stats.success,
            failed = stats.failed,
            "migration finished"
        );
        Ok(stats)
    }
}

/// Full creation payload, deep-mapping actions and attributes.
fn create_payload(resource: &Resource) -> ResourceCreate {
    ResourceCreate {
        key: resource.key.clone(),
        name: resource.name.clone(),
        description: resource.description.clone(),
        actions: resource.actions.clone(),
        attributes: resource.attributes.clone(),
    }
}

/// Partial update payload for override merges.
fn update_payload(resource: &Resource) -> ResourceUpdate {
    ResourceUpdate {
        name: Some(resource.name.clone()),
        description: resource.description.clone(),
        actions: Some(resource.actions.clone()),
        attributes: Some(resource.attributes.clone()),
    }
}
