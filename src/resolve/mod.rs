//! Derived-role resolution.
//!
//! A derived-role rule says "whoever holds `base_role` on a related
//! resource also gets `derived_role` here". Wiring one up requires picking
//! which relation connects the two resources; the resolver ensures both
//! roles exist, selects the relation, and patches the derived role's grant
//! rule.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::ident::{capitalize, sanitize_key};
use crate::reconcile::Reconciler;
use crate::store::{PolicyStore, Scope};
use crate::types::{
    DerivationGrant, GrantRule, Relation, ResourceRoleCreate, ResourceRoleUpdate,
};

/// What to do when a derivation names no relation and the subject resource
/// has more than one.
///
/// Picking the first listed relation is deterministic but arbitrary; a
/// resource with several semantically different relations can silently
/// derive through the wrong one. Callers that prefer an explicit failure
/// choose [`Fail`](RelationFallback::Fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationFallback {
    /// Use the first relation the store lists (default).
    #[default]
    FirstListed,
    /// Refuse to guess; require an explicit relation key.
    Fail,
}

/// A derivation to resolve.
#[derive(Debug, Clone)]
pub struct DerivationRequest {
    /// Role the principal must hold on the related resource.
    pub base_role: String,
    /// Role granted on the subject resource.
    pub derived_role: String,
    /// Subject resource carrying the derived role.
    pub resource: String,
    /// Preferred relation key, if the caller knows it.
    pub relation_hint: Option<String>,
}

/// The relation a derivation resolved through.
#[derive(Debug, Clone)]
pub struct ResolvedDerivation {
    /// The chosen relation.
    pub relation: Relation,
    /// Key of the object resource reached through it.
    pub object_resource: String,
}

/// Resolves derived-role declarations against the live model.
pub struct RelationResolver {
    store: Arc<dyn PolicyStore>,
    reconciler: Reconciler,
    fallback: RelationFallback,
}

impl RelationResolver {
    /// Creates a resolver with the [`RelationFallback::FirstListed`] default.
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            reconciler: Reconciler::new(store.clone()),
            store,
            fallback: RelationFallback::default(),
        }
    }

    /// Overrides the fallback used when no relation hint matches.
    #[must_use]
    pub fn with_fallback(mut self, fallback: RelationFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Wires one derived-role rule.
    ///
    /// Steps, in order:
    ///
    /// 1. Ensure the derived role exists on the subject resource.
    /// 2. List the subject resource's relations; empty is an error.
    /// 3. Pick the relation matching the hint, else apply the fallback.
    /// 4. Ensure the base role exists on the relation's object resource.
    /// 5. Patch the derived role's grant rule with the structured triple.
    ///
    /// Missing request fields fail with [`ErrorKind::InvalidArgument`]
    /// before any remote call is made.
    pub async fn resolve_derivation(
        &self,
        scope: &Scope,
        request: &DerivationRequest,
    ) -> Result<ResolvedDerivation> {
        if request.base_role.is_empty()
            || request.derived_role.is_empty()
            || request.resource.is_empty()
        {
            return Err(Error::invalid_argument(
                "derivation requires base_role, derived_role, and resource",
            ));
        }

        let subject = sanitize_key(&request.resource);
        let derived_key = sanitize_key(&request.derived_role);
        let base_key = sanitize_key(&request.base_role);

        self.reconciler
            .ensure_resource_role(
                scope,
                &subject,
                ResourceRoleCreate::new(&derived_key, capitalize(&derived_key)),
            )
            .await?;

        let relations = self.store.list_relations(scope, &subject).await?;
        if relations.is_empty() {
            return Err(Error::not_found(format!(
                "no relations found for resource '{}'",
                subject
            )));
        }

        let relation = self.pick_relation(&relations, request.relation_hint.as_deref())?;
        let object_resource = relation.object_resource.clone();
        debug!(
            subject = %subject,
            relation = %relation.key,
            object = %object_resource,
            "resolved derivation relation"
        );

        self.reconciler
            .ensure_resource_role(
                scope,
                &object_resource,
                ResourceRoleCreate::new(&base_key, capitalize(&base_key)),
            )
            .await?;

        let grant = GrantRule {
            role: base_key,
            on_resource: object_resource.clone(),
            linked_by_relation: relation.key.clone(),
        };
        let update = ResourceRoleUpdate {
            permissions: None,
            granted_to: Some(DerivationGrant {
                users_with_role: vec![grant],
            }),
        };
        self.store
            .update_resource_role(scope, &subject, &derived_key, &update)
            .await?;

        Ok(ResolvedDerivation {
            relation,
            object_resource,
        })
    }

    fn pick_relation(&self, relations: &[Relation], hint: Option<&str>) -> Result<Relation> {
        if let Some(hint) = hint {
            if let Some(found) = relations.iter().find(|r| r.key == hint) {
                return Ok(found.clone());
            }
        }
        match self.fallback {
            RelationFallback::FirstListed => Ok(relations[0].clone()),
            RelationFallback::Fail => Err(Error::invalid_argument(format!(
                "relation hint {:?} matched none of {} relations and guessing is disabled",
                hint,
                relations.len()
            ))),
        }
    }
}
