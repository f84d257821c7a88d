//! Ensure-style reconciliation of schema entities.
//!
//! Every write in the ingestion pipeline goes through the [`Reconciler`],
//! which turns "create X" into "make sure X exists": fetch first, create on
//! miss, and treat a concurrent duplicate as success. Backends are
//! eventually consistent, so a create that lost a race is confirmed by
//! polling the read path with [`poll_for_entity`] before giving up.

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use crate::config::BackoffPolicy;
use crate::error::{Error, ErrorKind, Result};
use crate::store::{PolicyStore, Scope};
use crate::types::{
    Relation, RelationCreate, Resource, ResourceCreate, ResourceRole, ResourceRoleCreate, Role,
    RoleCreate, RoleUpdate,
};

/// Outcome of an ensure call.
#[derive(Debug, Clone)]
pub struct Ensured<T> {
    /// The entity as the store now holds it.
    pub entity: T,
    /// `true` if this call created it, `false` if it already existed.
    pub created: bool,
}

/// Polls a read until it stops returning `NotFound`.
///
/// Waits grow by the policy's multiplier up to its interval cap. When the
/// overall budget runs out, one final check is made before reporting
/// [`ErrorKind::Timeout`]; entities often land right at the deadline.
/// Errors other than `NotFound` abort the poll immediately.
pub async fn poll_for_entity<T, F, Fut>(mut check: F, backoff: &BackoffPolicy) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut interval = backoff.initial_interval;

    loop {
        match check().await {
            Ok(entity) => return Ok(entity),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        if start.elapsed() + interval >= backoff.max_wait {
            break;
        }
        tokio::time::sleep(interval).await;
        interval = backoff.next_interval(interval);
    }

    match check().await {
        Ok(entity) => Ok(entity),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::new(
            ErrorKind::Timeout,
            format!(
                "entity did not become visible within {:?}",
                backoff.max_wait
            ),
        )),
        Err(e) => Err(e),
    }
}

/// Idempotent entity writer.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use policysync::{InMemoryPolicyStore, Reconciler, Scope};
/// use policysync::types::ResourceCreate;
///
/// # async fn example() -> Result<(), policysync::Error> {
/// let store = Arc::new(InMemoryPolicyStore::new());
/// let reconciler = Reconciler::new(store);
/// let scope = Scope::new("acme", "storefront", "dev");
///
/// let first = reconciler
///     .ensure_resource(&scope, ResourceCreate::new("document", "Document"))
///     .await?;
/// assert!(first.created);
///
/// let second = reconciler
///     .ensure_resource(&scope, ResourceCreate::new("document", "Document"))
///     .await?;
/// assert!(!second.created);
/// # Ok(())
/// # }
/// ```
pub struct Reconciler {
    store: Arc<dyn PolicyStore>,
    backoff: BackoffPolicy,
}

impl Reconciler {
    /// Creates a reconciler with the default backoff policy.
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Overrides the backoff policy used after conflicted creates.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the store this reconciler writes through.
    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    /// Ensures a resource exists.
    ///
    /// An existing resource is returned as-is; merging actions into it is
    /// the caller's job via [`ensure_action`](Self::ensure_action).
    pub async fn ensure_resource(
        &self,
        scope: &Scope,
        body: ResourceCreate,
    ) -> Result<Ensured<Resource>> {
        match self.store.get_resource(scope, &body.key).await {
            Ok(existing) => {
                debug!(key = %body.key, "resource already exists");
                return Ok(Ensured {
                    entity: existing,
                    created: false,
                });
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        match self.store.create_resource(scope, &body).await {
            Ok(created) => {
                debug!(key = %body.key, "created resource");
                Ok(Ensured {
                    entity: created,
                    created: true,
                })
            }
            Err(e) if e.is_duplicate() => {
                debug!(key = %body.key, "lost create race, polling for resource");
                let entity = poll_for_entity(
                    || self.store.get_resource(scope, &body.key),
                    &self.backoff,
                )
                .await?;
                Ok(Ensured {
                    entity,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Ensures an action exists on a resource. A duplicate is a no-op.
    pub async fn ensure_action(
        &self,
        scope: &Scope,
        resource_key: &str,
        action_key: &str,
        name: &str,
    ) -> Result<()> {
        match self
            .store
            .create_action(scope, resource_key, action_key, name)
            .await
        {
            Ok(()) => {
                debug!(resource = %resource_key, action = %action_key, "created action");
                Ok(())
            }
            Err(e) if e.is_duplicate() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Ensures an environment-level role exists and carries at least the
    /// requested permissions.
    ///
    /// Permissions on an existing role are appended to, never replaced;
    /// two documents feeding the same role accumulate grants.
    pub async fn ensure_role(&self, scope: &Scope, body: RoleCreate) -> Result<Ensured<Role>> {
        let existing = match self.store.get_role(scope, &body.key).await {
            Ok(role) => Some(role),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        if let Some(role) = existing {
            return self.merge_role_permissions(scope, role, &body.permissions).await;
        }

        match self.store.create_role(scope, &body).await {
            Ok(created) => {
                debug!(key = %body.key, "created role");
                Ok(Ensured {
                    entity: created,
                    created: true,
                })
            }
            Err(e) if e.is_duplicate() => {
                let role = poll_for_entity(
                    || self.store.get_role(scope, &body.key),
                    &self.backoff,
                )
                .await?;
                self.merge_role_permissions(scope, role, &body.permissions).await
            }
            Err(e) => Err(e),
        }
    }

    async fn merge_role_permissions(
        &self,
        scope: &Scope,
        role: Role,
        wanted: &[String],
    ) -> Result<Ensured<Role>> {
        let missing: Vec<String> = wanted
            .iter()
            .filter(|p| !role.permissions.contains(p))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(Ensured {
                entity: role,
                created: false,
            });
        }

        debug!(key = %role.key, added = missing.len(), "appending role permissions");
        let mut permissions = role.permissions.clone();
        permissions.extend(missing);
        let update = RoleUpdate {
            name: None,
            permissions: Some(permissions),
        };
        let entity = self.store.update_role(scope, &role.key, &update).await?;
        Ok(Ensured {
            entity,
            created: false,
        })
    }

    /// Ensures a resource-scoped role exists.
    pub async fn ensure_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        body: ResourceRoleCreate,
    ) -> Result<Ensured<ResourceRole>> {
        match self
            .store
            .get_resource_role(scope, resource_key, &body.key)
            .await
        {
            Ok(existing) => {
                return Ok(Ensured {
                    entity: existing,
                    created: false,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        match self
            .store
            .create_resource_role(scope, resource_key, &body)
            .await
        {
            Ok(created) => {
                debug!(resource = %resource_key, role = %body.key, "created resource role");
                Ok(Ensured {
                    entity: created,
                    created: true,
                })
            }
            Err(e) if e.is_duplicate() => {
                let entity = poll_for_entity(
                    || self.store.get_resource_role(scope, resource_key, &body.key),
                    &self.backoff,
                )
                .await?;
                Ok(Ensured {
                    entity,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Ensures a relation exists under its subject resource.
    pub async fn ensure_relation(
        &self,
        scope: &Scope,
        subject_resource: &str,
        body: RelationCreate,
    ) -> Result<Ensured<Relation>> {
        let found = self
            .store
            .list_relations(scope, subject_resource)
            .await?
            .into_iter()
            .find(|r| r.key == body.key && r.object_resource == body.object_resource);
        if let Some(existing) = found {
            return Ok(Ensured {
                entity: existing,
                created: false,
            });
        }

        match self
            .store
            .create_relation(scope, subject_resource, &body)
            .await
        {
            Ok(created) => {
                debug!(
                    subject = %subject_resource,
                    relation = %body.key,
                    object = %body.object_resource,
                    "created relation"
                );
                Ok(Ensured {
                    entity: created,
                    created: true,
                })
            }
            Err(e) if e.is_duplicate() => {
                let key = body.key.clone();
                let object = body.object_resource.clone();
                let entity = poll_for_entity(
                    || async {
                        self.store
                            .list_relations(scope, subject_resource)
                            .await?
                            .into_iter()
                            .find(|r| r.key == key && r.object_resource == object)
                            .ok_or_else(|| {
                                Error::new(ErrorKind::NotFound, "relation not visible yet")
                            })
                    },
                    &self.backoff,
                )
                .await?;
                Ok(Ensured {
                    entity,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Waits for a resource to be readable, for callers that need one
    /// created elsewhere to settle first.
    pub async fn await_resource(&self, scope: &Scope, key: &str) -> Result<Resource> {
        poll_for_entity(|| self.store.get_resource(scope, key), &self.backoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPolicyStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scope() -> Scope {
        Scope::new("acme", "storefront", "dev")
    }

    fn reconciler() -> (Arc<InMemoryPolicyStore>, Reconciler) {
        let store = Arc::new(InMemoryPolicyStore::new());
        let reconciler = Reconciler::new(store.clone());
        (store, reconciler)
    }

    #[tokio::test]
    async fn ensure_resource_is_idempotent() {
        let (_, reconciler) = reconciler();
        let first = reconciler
            .ensure_resource(&scope(), ResourceCreate::new("document", "Document"))
            .await
            .unwrap();
        assert!(first.created);

        let second = reconciler
            .ensure_resource(&scope(), ResourceCreate::new("document", "Document"))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.entity.key, "document");
    }

    #[tokio::test]
    async fn ensure_role_appends_permissions() {
        let (_, reconciler) = reconciler();
        let body = RoleCreate::new("editor_plus", "Editor Plus")
            .with_permissions(vec!["document:read".into()]);
        reconciler.ensure_role(&scope(), body).await.unwrap();

        let body = RoleCreate::new("editor_plus", "Editor Plus")
            .with_permissions(vec!["document:read".into(), "document:write".into()]);
        let merged = reconciler.ensure_role(&scope(), body).await.unwrap();

        assert!(!merged.created);
        assert_eq!(
            merged.entity.permissions,
            vec!["document:read".to_string(), "document:write".to_string()]
        );
    }

    #[tokio::test]
    async fn ensure_relation_deduplicates() {
        let (_, reconciler) = reconciler();
        reconciler
            .ensure_resource(&scope(), ResourceCreate::new("document", "Document"))
            .await
            .unwrap();

        let body = RelationCreate {
            key: "parent".into(),
            name: "Parent".into(),
            description: None,
            object_resource: "folder".into(),
        };
        let first = reconciler
            .ensure_relation(&scope(), "document", body.clone())
            .await
            .unwrap();
        assert!(first.created);

        let second = reconciler
            .ensure_relation(&scope(), "document", body)
            .await
            .unwrap();
        assert!(!second.created);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_with_final_check() {
        let attempts = AtomicUsize::new(0);
        let backoff = BackoffPolicy::default();

        let result: Result<()> = poll_for_entity(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::not_found("never there")) }
            },
            &backoff,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        // intervals 100, 150, 225, 337.5, 506.25, 759.375, then 1000 caps;
        // the budget of 3000ms admits a handful of sleeps plus a final check
        assert!(attempts.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_once_entity_appears() {
        let attempts = AtomicUsize::new(0);
        let backoff = BackoffPolicy::default();

        let value = poll_for_entity(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::not_found("not yet"))
                    } else {
                        Ok(42)
                    }
                }
            },
            &backoff,
        )
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_propagates_non_missing_errors() {
        let backoff = BackoffPolicy::default();
        let result: Result<()> = poll_for_entity(
            || async { Err(Error::new(ErrorKind::Unauthorized, "bad token")) },
            &backoff,
        )
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
    }
}
