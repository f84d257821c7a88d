//! Policy store abstraction.
//!
//! The engine talks to a policy backend through the [`PolicyStore`] trait.
//! Two implementations ship with the crate:
//!
//! - [`RestPolicyStore`] - HTTP client against a live policy service
//! - [`InMemoryPolicyStore`] - process-local double for tests
//!
//! Reconciliation, ingestion, export, and migration are all written against
//! the trait, so any backend that can answer these calls plugs in.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    ConditionSet, MappingConfig, Relation, RelationCreate, Resource, ResourceCreate,
    ResourceRole, ResourceRoleCreate, ResourceRoleUpdate, ResourceUpdate, Role, RoleCreate,
    RoleUpdate,
};

mod memory;
mod rest;

pub use memory::InMemoryPolicyStore;
pub use rest::{RestPolicyStore, RestPolicyStoreBuilder};

/// Addressing context for every store call.
///
/// All schema entities live under an organization / project / environment
/// triple. The scope is carried explicitly rather than held as client state
/// so one store can serve several environments (migration needs two at once).
///
/// ## Example
///
/// ```rust
/// use policysync::Scope;
///
/// let scope = Scope::new("acme", "storefront", "staging");
/// assert_eq!(scope.environment, "staging");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    /// Organization key.
    pub organization: String,
    /// Project key.
    pub project: String,
    /// Environment key.
    pub environment: String,
}

impl Scope {
    /// Creates a scope from its three keys.
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            environment: environment.into(),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.organization, self.project, self.environment
        )
    }
}

/// Backend operations the engine needs.
///
/// Every method takes the [`Scope`] it operates in. Errors carry an
/// [`ErrorKind`](crate::ErrorKind) that callers branch on: `Conflict` for
/// duplicate creates, `NotFound` for missing entities, and so on. An
/// implementation must normalize its backend's duplicate signal to
/// `Conflict` so retry logic stays backend-agnostic.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Lists all resources in the environment.
    async fn list_resources(&self, scope: &Scope) -> Result<Vec<Resource>>;

    /// Fetches one resource by key.
    async fn get_resource(&self, scope: &Scope, key: &str) -> Result<Resource>;

    /// Creates a resource. Fails with `Conflict` if the key exists.
    async fn create_resource(&self, scope: &Scope, body: &ResourceCreate) -> Result<Resource>;

    /// Updates an existing resource.
    async fn update_resource(
        &self,
        scope: &Scope,
        key: &str,
        body: &ResourceUpdate,
    ) -> Result<Resource>;

    /// Adds one action to an existing resource.
    async fn create_action(
        &self,
        scope: &Scope,
        resource_key: &str,
        action_key: &str,
        name: &str,
    ) -> Result<()>;

    /// Lists all environment-level roles.
    async fn list_roles(&self, scope: &Scope) -> Result<Vec<Role>>;

    /// Fetches one environment-level role by key.
    async fn get_role(&self, scope: &Scope, key: &str) -> Result<Role>;

    /// Creates an environment-level role.
    async fn create_role(&self, scope: &Scope, body: &RoleCreate) -> Result<Role>;

    /// Updates an environment-level role.
    async fn update_role(&self, scope: &Scope, key: &str, body: &RoleUpdate) -> Result<Role>;

    /// Lists the roles scoped to one resource.
    async fn list_resource_roles(
        &self,
        scope: &Scope,
        resource_key: &str,
    ) -> Result<Vec<ResourceRole>>;

    /// Fetches one resource-scoped role.
    async fn get_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        role_key: &str,
    ) -> Result<ResourceRole>;

    /// Creates a resource-scoped role.
    async fn create_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        body: &ResourceRoleCreate,
    ) -> Result<ResourceRole>;

    /// Updates a resource-scoped role, including its derivation grants.
    async fn update_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        role_key: &str,
        body: &ResourceRoleUpdate,
    ) -> Result<ResourceRole>;

    /// Lists the relations whose subject is the given resource.
    async fn list_relations(&self, scope: &Scope, resource_key: &str) -> Result<Vec<Relation>>;

    /// Creates a relation under its subject resource.
    async fn create_relation(
        &self,
        scope: &Scope,
        subject_resource: &str,
        body: &RelationCreate,
    ) -> Result<Relation>;

    /// Lists all condition sets (user sets and resource sets together).
    async fn list_condition_sets(&self, scope: &Scope) -> Result<Vec<ConditionSet>>;

    /// Deletes the routing config under a namespace key. Missing is not an
    /// error; the caller is about to recreate it anyway.
    async fn delete_mapping_config(&self, scope: &Scope, namespace: &str) -> Result<()>;

    /// Creates a routing config under its namespace key.
    async fn create_mapping_config(&self, scope: &Scope, body: &MappingConfig) -> Result<()>;
}
