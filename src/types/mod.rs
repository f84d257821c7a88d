//! Data model for the policy store.
//!
//! These are the wire shapes exchanged with the remote policy service:
//! read shapes (`Resource`, `Role`, ...) returned by list/get operations and
//! create/update payloads matching the store's creation schemas. Migration
//! deep-maps read shapes back into payloads; ingestion builds payloads from
//! specification annotations.

mod condition;
mod mapping;
mod relation;
mod resource;
mod role;

pub use condition::{ConditionSet, ConditionSetType};
pub use mapping::{MappingConfig, UrlMapping};
pub use relation::{Relation, RelationCreate};
pub use resource::{
    ActionSpec, AttributeSpec, AttributeType, Resource, ResourceCreate, ResourceUpdate,
    USER_RESOURCE_KEY,
};
pub use role::{
    DerivationGrant, GrantRule, ResourceRole, ResourceRoleCreate, ResourceRoleUpdate, Role,
    RoleCreate, RoleUpdate, RESERVED_ROLE_KEYS,
};
