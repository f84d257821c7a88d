//! Prelude module for convenient imports.
//!
//! Re-exports the most commonly used types:
//!
//! ```rust
//! use policysync::prelude::*;
//! ```

pub use crate::{
    config::{BackoffPolicy, IngestOptions},
    error::{Error, ErrorKind, Result},
    export::{ExportOutput, Exporter},
    ingest::{IngestReport, IngestStatus, IngestionPipeline, SpecDocument},
    migrate::{ConflictStrategy, MigrationEngine, MigrationStats},
    reconcile::{Ensured, Reconciler},
    resolve::{DerivationRequest, RelationFallback, RelationResolver, ResolvedDerivation},
    store::{InMemoryPolicyStore, PolicyStore, RestPolicyStore, RestPolicyStoreBuilder, Scope},
    types::{
        ConditionSet, ConditionSetType, MappingConfig, Relation, Resource, ResourceRole, Role,
        UrlMapping,
    },
};
