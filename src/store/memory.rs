//! In-memory policy store for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, ErrorKind, Result};
use crate::store::{PolicyStore, Scope};
use crate::types::{
    ActionSpec, ConditionSet, MappingConfig, Relation, RelationCreate, Resource, ResourceCreate,
    ResourceRole, ResourceRoleCreate, ResourceRoleUpdate, ResourceUpdate, Role, RoleCreate,
    RoleUpdate,
};

/// An in-memory policy store with real create/conflict semantics.
///
/// Unlike a canned mock, this stores entities per environment and answers
/// with the same error kinds a live backend would: `Conflict` on duplicate
/// creates and `NotFound` on missing keys. Integration tests run whole
/// ingestion and migration flows against it without a network.
///
/// ## Example
///
/// ```rust
/// use policysync::{InMemoryPolicyStore, PolicyStore, Scope};
/// use policysync::types::ResourceCreate;
///
/// # async fn example() -> Result<(), policysync::Error> {
/// let store = InMemoryPolicyStore::new();
/// let scope = Scope::new("acme", "storefront", "dev");
///
/// store
///     .create_resource(&scope, &ResourceCreate::new("document", "Document"))
///     .await?;
/// assert!(store.get_resource(&scope, "document").await.is_ok());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    inner: Arc<RwLock<HashMap<Scope, EnvState>>>,
}

#[derive(Default)]
struct EnvState {
    resources: BTreeMap<String, Resource>,
    roles: BTreeMap<String, Role>,
    // keyed by (resource, role)
    resource_roles: BTreeMap<(String, String), ResourceRole>,
    // keyed by subject resource
    relations: BTreeMap<String, Vec<Relation>>,
    condition_sets: Vec<ConditionSet>,
    mapping_configs: BTreeMap<String, MappingConfig>,
}

impl InMemoryPolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a pre-existing resource, as if created out of band.
    pub fn seed_resource(&self, scope: &Scope, resource: Resource) {
        let mut inner = self.inner.write();
        let env = inner.entry(scope.clone()).or_default();
        env.resources.insert(resource.key.clone(), resource);
    }

    /// Seeds a pre-existing environment-level role.
    pub fn seed_role(&self, scope: &Scope, role: Role) {
        let mut inner = self.inner.write();
        let env = inner.entry(scope.clone()).or_default();
        env.roles.insert(role.key.clone(), role);
    }

    /// Seeds a condition set for export tests.
    pub fn seed_condition_set(&self, scope: &Scope, set: ConditionSet) {
        let mut inner = self.inner.write();
        let env = inner.entry(scope.clone()).or_default();
        env.condition_sets.push(set);
    }

    /// Returns the routing config stored under a namespace, if any.
    pub fn mapping_config(&self, scope: &Scope, namespace: &str) -> Option<MappingConfig> {
        let inner = self.inner.read();
        inner
            .get(scope)
            .and_then(|env| env.mapping_configs.get(namespace).cloned())
    }

    fn with_env<T>(&self, scope: &Scope, f: impl FnOnce(&EnvState) -> Result<T>) -> Result<T> {
        let inner = self.inner.read();
        match inner.get(scope) {
            Some(env) => f(env),
            None => f(&EnvState::default()),
        }
    }

    fn with_env_mut<T>(
        &self,
        scope: &Scope,
        f: impl FnOnce(&mut EnvState) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.write();
        let env = inner.entry(scope.clone()).or_default();
        f(env)
    }
}

fn not_found(what: &str, key: &str) -> Error {
    Error::new(ErrorKind::NotFound, format!("{} '{}' not found", what, key)).with_status(404)
}

fn conflict(what: &str, key: &str) -> Error {
    Error::new(
        ErrorKind::Conflict,
        format!("{} '{}' already exists", what, key),
    )
    .with_status(409)
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn list_resources(&self, scope: &Scope) -> Result<Vec<Resource>> {
        self.with_env(scope, |env| Ok(env.resources.values().cloned().collect()))
    }

    async fn get_resource(&self, scope: &Scope, key: &str) -> Result<Resource> {
        self.with_env(scope, |env| {
            env.resources
                .get(key)
                .cloned()
                .ok_or_else(|| not_found("resource", key))
        })
    }

    async fn create_resource(&self, scope: &Scope, body: &ResourceCreate) -> Result<Resource> {
        self.with_env_mut(scope, |env| {
            if env.resources.contains_key(&body.key) {
                return Err(conflict("resource", &body.key));
            }
            let resource = Resource {
                key: body.key.clone(),
                name: body.name.clone(),
                description: body.description.clone(),
                urn: None,
                actions: body.actions.clone(),
                attributes: body.attributes.clone(),
                relations: BTreeMap::new(),
                roles: BTreeMap::new(),
            };
            env.resources.insert(body.key.clone(), resource.clone());
            Ok(resource)
        })
    }

    async fn update_resource(
        &self,
        scope: &Scope,
        key: &str,
        body: &ResourceUpdate,
    ) -> Result<Resource> {
        self.with_env_mut(scope, |env| {
            let resource = env
                .resources
                .get_mut(key)
                .ok_or_else(|| not_found("resource", key))?;
            if let Some(ref name) = body.name {
                resource.name = name.clone();
            }
            if let Some(ref description) = body.description {
                resource.description = Some(description.clone());
            }
            if let Some(ref actions) = body.actions {
                resource.actions.extend(actions.clone());
            }
            if let Some(ref attributes) = body.attributes {
                resource.attributes.extend(attributes.clone());
            }
            Ok(resource.clone())
        })
    }

    async fn create_action(
        &self,
        scope: &Scope,
        resource_key: &str,
        action_key: &str,
        name: &str,
    ) -> Result<()> {
        self.with_env_mut(scope, |env| {
            let resource = env
                .resources
                .get_mut(resource_key)
                .ok_or_else(|| not_found("resource", resource_key))?;
            if resource.actions.contains_key(action_key) {
                return Err(conflict("action", action_key));
            }
            resource
                .actions
                .insert(action_key.to_string(), ActionSpec::named(name));
            Ok(())
        })
    }

    async fn list_roles(&self, scope: &Scope) -> Result<Vec<Role>> {
        self.with_env(scope, |env| Ok(env.roles.values().cloned().collect()))
    }

    async fn get_role(&self, scope: &Scope, key: &str) -> Result<Role> {
        self.with_env(scope, |env| {
            env.roles
                .get(key)
                .cloned()
                .ok_or_else(|| not_found("role", key))
        })
    }

    async fn create_role(&self, scope: &Scope, body: &RoleCreate) -> Result<Role> {
        self.with_env_mut(scope, |env| {
            if env.roles.contains_key(&body.key) {
                return Err(conflict("role", &body.key));
            }
            let role = Role {
                key: body.key.clone(),
                name: body.name.clone(),
                description: body.description.clone(),
                permissions: body.permissions.clone(),
                extends: Vec::new(),
            };
            env.roles.insert(body.key.clone(), role.clone());
            Ok(role)
        })
    }

    async fn update_role(&self, scope: &Scope, key: &str, body: &RoleUpdate) -> Result<Role> {
        self.with_env_mut(scope, |env| {
            let role = env
                .roles
                .get_mut(key)
                .ok_or_else(|| not_found("role", key))?;
            if let Some(ref name) = body.name {
                role.name = name.clone();
            }
            if let Some(ref permissions) = body.permissions {
                role.permissions = permissions.clone();
            }
            Ok(role.clone())
        })
    }

    async fn list_resource_roles(
        &self,
        scope: &Scope,
        resource_key: &str,
    ) -> Result<Vec<ResourceRole>> {
        self.with_env(scope, |env| {
            Ok(env
                .resource_roles
                .iter()
                .filter(|((resource, _), _)| resource == resource_key)
                .map(|(_, role)| role.clone())
                .collect())
        })
    }

    async fn get_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        role_key: &str,
    ) -> Result<ResourceRole> {
        self.with_env(scope, |env| {
            env.resource_roles
                .get(&(resource_key.to_string(), role_key.to_string()))
                .cloned()
                .ok_or_else(|| not_found("resource role", role_key))
        })
    }

    async fn create_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        body: &ResourceRoleCreate,
    ) -> Result<ResourceRole> {
        self.with_env_mut(scope, |env| {
            if !env.resources.contains_key(resource_key) {
                return Err(not_found("resource", resource_key));
            }
            let slot = (resource_key.to_string(), body.key.clone());
            if env.resource_roles.contains_key(&slot) {
                return Err(conflict("resource role", &body.key));
            }
            let role = ResourceRole {
                key: body.key.clone(),
                name: body.name.clone(),
                description: body.description.clone(),
                permissions: body.permissions.clone(),
                extends: Vec::new(),
                granted_to: None,
            };
            env.resource_roles.insert(slot.clone(), role.clone());
            if let Some(resource) = env.resources.get_mut(resource_key) {
                resource.roles.insert(body.key.clone(), role.clone());
            }
            Ok(role)
        })
    }

    async fn update_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        role_key: &str,
        body: &ResourceRoleUpdate,
    ) -> Result<ResourceRole> {
        self.with_env_mut(scope, |env| {
            let slot = (resource_key.to_string(), role_key.to_string());
            let role = env
                .resource_roles
                .get_mut(&slot)
                .ok_or_else(|| not_found("resource role", role_key))?;
            if let Some(ref permissions) = body.permissions {
                role.permissions = permissions.clone();
            }
            if let Some(ref granted_to) = body.granted_to {
                role.granted_to = Some(granted_to.clone());
            }
            let updated = role.clone();
            if let Some(resource) = env.resources.get_mut(resource_key) {
                resource.roles.insert(role_key.to_string(), updated.clone());
            }
            Ok(updated)
        })
    }

    async fn list_relations(&self, scope: &Scope, resource_key: &str) -> Result<Vec<Relation>> {
        self.with_env(scope, |env| {
            if !env.resources.contains_key(resource_key) {
                return Err(not_found("resource", resource_key));
            }
            Ok(env.relations.get(resource_key).cloned().unwrap_or_default())
        })
    }

    async fn create_relation(
        &self,
        scope: &Scope,
        subject_resource: &str,
        body: &RelationCreate,
    ) -> Result<Relation> {
        self.with_env_mut(scope, |env| {
            if !env.resources.contains_key(subject_resource) {
                return Err(not_found("resource", subject_resource));
            }
            let existing = env.relations.entry(subject_resource.to_string()).or_default();
            if existing
                .iter()
                .any(|r| r.key == body.key && r.object_resource == body.object_resource)
            {
                return Err(conflict("relation", &body.key));
            }
            let relation = Relation {
                key: body.key.clone(),
                name: body.name.clone(),
                description: body.description.clone(),
                subject_resource: subject_resource.to_string(),
                object_resource: body.object_resource.clone(),
            };
            existing.push(relation.clone());
            if let Some(resource) = env.resources.get_mut(subject_resource) {
                resource
                    .relations
                    .insert(relation.key.clone(), relation.object_resource.clone());
            }
            Ok(relation)
        })
    }

    async fn list_condition_sets(&self, scope: &Scope) -> Result<Vec<ConditionSet>> {
        self.with_env(scope, |env| Ok(env.condition_sets.clone()))
    }

    async fn delete_mapping_config(&self, scope: &Scope, namespace: &str) -> Result<()> {
        self.with_env_mut(scope, |env| {
            env.mapping_configs.remove(namespace);
            Ok(())
        })
    }

    async fn create_mapping_config(&self, scope: &Scope, body: &MappingConfig) -> Result<()> {
        self.with_env_mut(scope, |env| {
            if env.mapping_configs.contains_key(&body.key) {
                return Err(conflict("mapping config", &body.key));
            }
            env.mapping_configs.insert(body.key.clone(), body.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("acme", "storefront", "dev")
    }

    #[tokio::test]
    async fn duplicate_resource_create_conflicts() {
        let store = InMemoryPolicyStore::new();
        let body = ResourceCreate::new("document", "Document");
        store.create_resource(&scope(), &body).await.unwrap();

        let err = store.create_resource(&scope(), &body).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let store = InMemoryPolicyStore::new();
        let err = store.get_resource(&scope(), "ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn environments_are_isolated() {
        let store = InMemoryPolicyStore::new();
        let dev = Scope::new("acme", "storefront", "dev");
        let prod = Scope::new("acme", "storefront", "prod");

        store
            .create_resource(&dev, &ResourceCreate::new("document", "Document"))
            .await
            .unwrap();

        assert!(store.get_resource(&prod, "document").await.is_err());
    }

    #[tokio::test]
    async fn relation_lands_on_subject_resource() {
        let store = InMemoryPolicyStore::new();
        store
            .create_resource(&scope(), &ResourceCreate::new("document", "Document"))
            .await
            .unwrap();

        let body = RelationCreate {
            key: "parent".into(),
            name: "Parent".into(),
            description: None,
            object_resource: "folder".into(),
        };
        store.create_relation(&scope(), "document", &body).await.unwrap();

        let relations = store.list_relations(&scope(), "document").await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].subject_resource, "document");
        assert_eq!(relations[0].object_resource, "folder");

        let resource = store.get_resource(&scope(), "document").await.unwrap();
        assert_eq!(resource.relations.get("parent").unwrap(), "folder");
    }

    #[tokio::test]
    async fn mapping_config_replace_cycle() {
        let store = InMemoryPolicyStore::new();
        let config = MappingConfig {
            key: "openapi".into(),
            name: "openapi".into(),
            mapping_rules: Vec::new(),
            auth_mechanism: "Bearer".into(),
            secret: "openapi_token".into(),
        };

        store.create_mapping_config(&scope(), &config).await.unwrap();
        let err = store
            .create_mapping_config(&scope(), &config)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        store.delete_mapping_config(&scope(), "openapi").await.unwrap();
        store.create_mapping_config(&scope(), &config).await.unwrap();
    }
}
