//! Five-phase ingestion of an annotated specification document.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::IngestOptions;
use crate::error::ErrorKind;
use crate::ident::{capitalize, sanitize_key};
use crate::ingest::document::{RelationAnnotation, SpecDocument};
use crate::reconcile::Reconciler;
use crate::resolve::{DerivationRequest, RelationFallback, RelationResolver};
use crate::store::{PolicyStore, Scope};
use crate::types::{
    MappingConfig, RelationCreate, ResourceCreate, ResourceRoleCreate, RoleCreate, RoleUpdate,
    UrlMapping, RESERVED_ROLE_KEYS,
};

/// Outcome of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    /// Every entity reconciled cleanly.
    Success,
    /// Some entities failed; the rest of the run still completed.
    PartialFailure {
        /// How many entity-level failures occurred.
        errors: usize,
        /// The last failure message, for quick diagnosis.
        last_error: String,
    },
}

/// Counters and accumulated diagnostics from one ingestion run.
///
/// A re-run over an already-reconciled model reports all `*_created`
/// counters as zero and `Success`.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Resources created in phase one (including relation stubs).
    pub resources_created: usize,
    /// Actions created in phase one.
    pub actions_created: usize,
    /// Environment-level roles created in phase two.
    pub roles_created: usize,
    /// Relations created in phase three.
    pub relations_created: usize,
    /// Resource-scoped roles created in phase four.
    pub resource_roles_created: usize,
    /// Derived-role rules wired in phase four.
    pub derivations_resolved: usize,
    /// Routing rules written in phase five.
    pub mapping_rules_written: usize,
    /// Entity-level failures, in occurrence order.
    pub errors: Vec<String>,
    /// Non-fatal observations (skipped annotations, tolerated fetch failures).
    pub warnings: Vec<String>,
}

impl IngestReport {
    /// Derives the run status from the error list.
    pub fn status(&self) -> IngestStatus {
        match self.errors.last() {
            None => IngestStatus::Success,
            Some(last) => IngestStatus::PartialFailure {
                errors: self.errors.len(),
                last_error: last.clone(),
            },
        }
    }

    /// Total entities created across all phases.
    pub fn created_total(&self) -> usize {
        self.resources_created
            + self.actions_created
            + self.roles_created
            + self.relations_created
            + self.resource_roles_created
    }
}

/// Runs the phased reconciliation of a [`SpecDocument`].
///
/// Phases are strictly ordered because later phases read entities the
/// earlier ones wrote: resources and actions first, then roles, then
/// relations, then resource roles and derivations, then routing rules.
/// One entity's failure is recorded and the run continues; only a
/// document that fails to parse aborts ingestion outright.
pub struct IngestionPipeline {
    store: Arc<dyn PolicyStore>,
    reconciler: Reconciler,
    resolver: RelationResolver,
    options: IngestOptions,
}

impl IngestionPipeline {
    /// Creates a pipeline with default options.
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            reconciler: Reconciler::new(store.clone()),
            resolver: RelationResolver::new(store.clone()),
            store,
            options: IngestOptions::default(),
        }
    }

    /// Overrides the ingestion options.
    #[must_use]
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides the relation fallback used for derivations.
    #[must_use]
    pub fn with_relation_fallback(mut self, fallback: RelationFallback) -> Self {
        self.resolver = self.resolver.with_fallback(fallback);
        self
    }

    /// Ingests one document into the scoped environment.
    pub async fn ingest(&self, scope: &Scope, document: &SpecDocument) -> IngestReport {
        let mut report = IngestReport::default();
        let mut state = ModelState::load(self.store.as_ref(), scope, &mut report).await;

        self.reconcile_resources(scope, document, &mut state, &mut report)
            .await;
        self.reconcile_roles(scope, document, &mut report).await;
        let relations_touched = self
            .reconcile_relations(scope, document, &mut state, &mut report)
            .await;
        if relations_touched {
            // Derivations read relations back; give the store's read path
            // time to catch up with the writes.
            tokio::time::sleep(self.options.settle_delay).await;
        }
        self.reconcile_resource_roles(scope, document, &state, &mut report)
            .await;
        self.write_mappings(scope, document, &mut report).await;

        debug!(
            created = report.created_total(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "ingestion run finished"
        );
        report
    }

    /// Phase one: resources and their actions.
    async fn reconcile_resources(
        &self,
        scope: &Scope,
        document: &SpecDocument,
        state: &mut ModelState,
        report: &mut IngestReport,
    ) {
        for (path, item) in &document.paths {
            let Some(raw_resource) = item.resource.as_deref() else {
                continue;
            };
            let resource_key = sanitize_key(raw_resource);

            if !state.resources.contains(&resource_key) {
                let body = ResourceCreate::new(&resource_key, capitalize(&resource_key));
                match self.reconciler.ensure_resource(scope, body).await {
                    Ok(ensured) => {
                        if ensured.created {
                            report.resources_created += 1;
                        }
                        state.resources.insert(resource_key.clone());
                        for action in ensured.entity.actions.keys() {
                            state.note_action(&resource_key, action);
                        }
                    }
                    Err(e) => {
                        report
                            .errors
                            .push(format!("resource '{}' ({}): {}", resource_key, path, e));
                        continue;
                    }
                }
            }

            for (method, op) in item.operations() {
                let action_key = sanitize_key(op.action.as_deref().unwrap_or(method));
                let action_name = op.summary.clone().unwrap_or_else(|| action_key.clone());
                if state.has_action(&resource_key, &action_key) {
                    continue;
                }
                match self
                    .reconciler
                    .ensure_action(scope, &resource_key, &action_key, &action_name)
                    .await
                {
                    Ok(()) => {
                        report.actions_created += 1;
                        state.note_action(&resource_key, &action_key);
                    }
                    Err(e) => report.errors.push(format!(
                        "action '{}:{}': {}",
                        resource_key, action_key, e
                    )),
                }
            }
        }
    }

    /// Phase two: environment-level roles and their permissions.
    ///
    /// Reserved generic role keys are treated as built-in: their
    /// permissions are merged but the roles themselves are never created.
    async fn reconcile_roles(
        &self,
        scope: &Scope,
        document: &SpecDocument,
        report: &mut IngestReport,
    ) {
        for item in document.paths.values() {
            let Some(raw_resource) = item.resource.as_deref() else {
                continue;
            };
            let resource_key = sanitize_key(raw_resource);

            for (method, op) in item.operations() {
                let Some(annotation) = op.roles.as_ref() else {
                    continue;
                };
                let action_key = sanitize_key(op.action.as_deref().unwrap_or(method));
                let permission = format!("{}:{}", resource_key, action_key);

                for raw_role in annotation.keys() {
                    let role_key = sanitize_key(raw_role);
                    let result = if RESERVED_ROLE_KEYS.contains(&role_key.as_str()) {
                        self.merge_builtin_role(scope, &role_key, &permission, report)
                            .await
                    } else {
                        let body = RoleCreate::new(&role_key, capitalize(&role_key))
                            .with_permissions(vec![permission.clone()]);
                        self.reconciler
                            .ensure_role(scope, body)
                            .await
                            .map(|ensured| ensured.created)
                    };
                    match result {
                        Ok(true) => report.roles_created += 1,
                        Ok(false) => {}
                        Err(e) => report
                            .errors
                            .push(format!("role '{}': {}", role_key, e)),
                    }
                }
            }
        }
    }

    /// Appends a permission to a built-in role without ever creating it.
    async fn merge_builtin_role(
        &self,
        scope: &Scope,
        role_key: &str,
        permission: &str,
        report: &mut IngestReport,
    ) -> crate::error::Result<bool> {
        match self.store.get_role(scope, role_key).await {
            Ok(role) => {
                if role.permissions.iter().any(|p| p == permission) {
                    return Ok(false);
                }
                let mut permissions = role.permissions;
                permissions.push(permission.to_string());
                let update = RoleUpdate {
                    name: None,
                    permissions: Some(permissions),
                };
                self.store.update_role(scope, role_key, &update).await?;
                Ok(false)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                report.warnings.push(format!(
                    "built-in role '{}' not present in environment, skipping grant",
                    role_key
                ));
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Phase three: relations, creating stub resources for endpoints the
    /// document never declared on a path. Returns whether any relation
    /// annotations were processed.
    async fn reconcile_relations(
        &self,
        scope: &Scope,
        document: &SpecDocument,
        state: &mut ModelState,
        report: &mut IngestReport,
    ) -> bool {
        let mut touched = false;
        for item in document.paths.values() {
            let op_relations = item.operations().filter_map(|(_, op)| op.relation.as_ref());
            for annotation in item.relation.iter().chain(op_relations) {
                touched = true;
                self.reconcile_relation(scope, annotation, state, report)
                    .await;
            }
        }
        touched
    }

    async fn reconcile_relation(
        &self,
        scope: &Scope,
        annotation: &RelationAnnotation,
        state: &mut ModelState,
        report: &mut IngestReport,
    ) {
        let subject = sanitize_key(&annotation.subject_resource);
        let object = sanitize_key(&annotation.object_resource);
        if subject.is_empty() || object.is_empty() {
            report.warnings.push(
                "relation annotation missing subject_resource or object_resource, skipped"
                    .to_string(),
            );
            return;
        }

        for endpoint in [&subject, &object] {
            if state.resources.contains(endpoint) {
                continue;
            }
            let body = ResourceCreate::new(endpoint, capitalize(endpoint));
            match self.reconciler.ensure_resource(scope, body).await {
                Ok(ensured) => {
                    if ensured.created {
                        report.resources_created += 1;
                    }
                    state.resources.insert(endpoint.clone());
                }
                Err(e) => {
                    report
                        .errors
                        .push(format!("resource '{}': {}", endpoint, e));
                    return;
                }
            }
        }

        let key = annotation
            .key
            .as_deref()
            .map(sanitize_key)
            .unwrap_or_else(|| "parent".to_string());
        let name = annotation
            .name
            .clone()
            .unwrap_or_else(|| capitalize(&key));
        let body = RelationCreate {
            key: key.clone(),
            name,
            description: None,
            object_resource: object.clone(),
        };
        match self.reconciler.ensure_relation(scope, &subject, body).await {
            Ok(ensured) if ensured.created => report.relations_created += 1,
            Ok(_) => {}
            Err(e) => report.errors.push(format!(
                "relation '{}:{}:{}': {}",
                subject, key, object, e
            )),
        }
    }

    /// Phase four: resource-scoped roles and derived-role wiring.
    async fn reconcile_resource_roles(
        &self,
        scope: &Scope,
        document: &SpecDocument,
        state: &ModelState,
        report: &mut IngestReport,
    ) {
        for item in document.paths.values() {
            let resource_key = item.resource.as_deref().map(sanitize_key);

            for (_, op) in item.operations() {
                if let Some(raw_role) = op.resource_role.as_deref() {
                    let Some(resource_key) = resource_key.as_deref() else {
                        report.warnings.push(format!(
                            "resource role '{}' declared on a path without a resource, skipped",
                            raw_role
                        ));
                        continue;
                    };
                    self.reconcile_resource_role(scope, resource_key, raw_role, state, report)
                        .await;
                }

                if let Some(derived) = op.derived_role.as_ref() {
                    let resource = derived
                        .resource
                        .clone()
                        .or_else(|| resource_key.clone())
                        .unwrap_or_default();
                    let request = DerivationRequest {
                        base_role: derived.base_role.clone(),
                        derived_role: derived.derived_role.clone(),
                        resource,
                        relation_hint: derived.relation.clone(),
                    };
                    match self.resolver.resolve_derivation(scope, &request).await {
                        Ok(resolved) => {
                            report.derivations_resolved += 1;
                            debug!(
                                derived = %request.derived_role,
                                relation = %resolved.relation.key,
                                on_resource = %resolved.object_resource,
                                "derivation wired"
                            );
                        }
                        Err(e) => report.errors.push(format!(
                            "derivation '{}' -> '{}': {}",
                            request.base_role, request.derived_role, e
                        )),
                    }
                }
            }
        }
    }

    async fn reconcile_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        raw_role: &str,
        state: &ModelState,
        report: &mut IngestReport,
    ) {
        let role_key = sanitize_key(raw_role);
        let name = format!("{}#{}", capitalize(resource_key), capitalize(&role_key));
        let permissions = state.permissions_for(resource_key);
        let body = ResourceRoleCreate::new(&role_key, name).with_permissions(permissions);

        match self
            .reconciler
            .ensure_resource_role(scope, resource_key, body)
            .await
        {
            Ok(ensured) if ensured.created => report.resource_roles_created += 1,
            Ok(_) => {}
            Err(e) => report.errors.push(format!(
                "resource role '{}#{}': {}",
                resource_key, role_key, e
            )),
        }
    }

    /// Phase five: batch-replaces the routing config for this namespace.
    async fn write_mappings(
        &self,
        scope: &Scope,
        document: &SpecDocument,
        report: &mut IngestReport,
    ) {
        let base_url = document.base_url().map(|u| u.trim_end_matches('/'));
        let mut rules = Vec::new();

        for (path, item) in &document.paths {
            let Some(raw_resource) = item.resource.as_deref() else {
                continue;
            };
            let resource_key = sanitize_key(raw_resource);
            for (method, op) in item.operations() {
                let action_key = sanitize_key(op.action.as_deref().unwrap_or(method));
                let url = match base_url {
                    Some(base) => format!("{}{}", base, path),
                    None => path.clone(),
                };
                rules.push(UrlMapping {
                    url,
                    http_method: method.to_string(),
                    resource: resource_key.clone(),
                    action: action_key,
                });
            }
        }

        if rules.is_empty() {
            return;
        }

        let namespace = self.options.mapping_namespace.clone();
        if let Err(e) = self.store.delete_mapping_config(scope, &namespace).await {
            warn!(namespace = %namespace, error = %e, "failed to clear previous routing config");
            report
                .warnings
                .push(format!("routing config '{}' cleanup: {}", namespace, e));
        }

        let config = MappingConfig {
            key: namespace.clone(),
            name: namespace.clone(),
            mapping_rules: rules,
            auth_mechanism: self.options.mapping_auth_mechanism.clone(),
            secret: self.options.mapping_secret.clone(),
        };
        match self.store.create_mapping_config(scope, &config).await {
            Ok(()) => report.mapping_rules_written = config.mapping_rules.len(),
            Err(e) => report
                .errors
                .push(format!("routing config '{}': {}", namespace, e)),
        }
    }
}

/// Known remote state, pre-seeded once per run so phases can skip
/// entities that already exist without a fetch each.
struct ModelState {
    resources: BTreeSet<String>,
    actions: BTreeMap<String, BTreeSet<String>>,
}

impl ModelState {
    async fn load(store: &dyn PolicyStore, scope: &Scope, report: &mut IngestReport) -> Self {
        let mut state = Self {
            resources: BTreeSet::new(),
            actions: BTreeMap::new(),
        };
        // A fetch failure here only costs redundant ensure calls later.
        match store.list_resources(scope).await {
            Ok(resources) => {
                for resource in resources {
                    for action in resource.actions.keys() {
                        state.note_action(&resource.key, action);
                    }
                    state.resources.insert(resource.key);
                }
            }
            Err(e) => {
                warn!(error = %e, "could not pre-fetch existing resources");
                report
                    .warnings
                    .push(format!("could not pre-fetch existing resources: {}", e));
            }
        }
        state
    }

    fn note_action(&mut self, resource: &str, action: &str) {
        self.actions
            .entry(resource.to_string())
            .or_default()
            .insert(action.to_string());
    }

    fn has_action(&self, resource: &str, action: &str) -> bool {
        self.actions
            .get(resource)
            .is_some_and(|set| set.contains(action))
    }

    /// All of a resource's known actions as `resource:action` permission
    /// strings, skipping any already carrying a prefix.
    fn permissions_for(&self, resource: &str) -> Vec<String> {
        self.actions
            .get(resource)
            .map(|actions| {
                actions
                    .iter()
                    .map(|action| {
                        if action.contains(':') {
                            action.clone()
                        } else {
                            format!("{}:{}", resource, action)
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
