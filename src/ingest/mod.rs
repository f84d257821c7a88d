//! Specification ingestion.
//!
//! Turns an annotated API-specification document into policy entities:
//! resources, actions, roles, relations, derived roles, and routing
//! rules, reconciled in five ordered phases.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use policysync::{IngestionPipeline, InMemoryPolicyStore, Scope, SpecDocument};
//!
//! # async fn example() -> Result<(), policysync::Error> {
//! let document = SpecDocument::from_json(r#"{
//!     "paths": {
//!         "/docs/{id}": {
//!             "x-policy-resource": "document",
//!             "get": {}
//!         }
//!     }
//! }"#)?;
//!
//! let store = Arc::new(InMemoryPolicyStore::new());
//! let pipeline = IngestionPipeline::new(store);
//! let scope = Scope::new("acme", "storefront", "dev");
//!
//! let report = pipeline.ingest(&scope, &document).await;
//! assert!(report.errors.is_empty());
//! # Ok(())
//! # }
//! ```

mod document;
mod pipeline;

pub use document::{
    DerivedRoleAnnotation, Operation, PathItem, RelationAnnotation, RoleAnnotation, Server,
    SpecDocument,
};
pub use pipeline::{IngestReport, IngestStatus, IngestionPipeline};
