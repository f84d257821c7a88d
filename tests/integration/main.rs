//! Integration tests for policysync.
//!
//! Everything here runs in-process: flows exercise the in-memory policy
//! store, and the REST store is tested against a local wiremock server.
//! No network or credentials are required.
//!
//! ```bash
//! cargo test --test integration
//! ```

mod common;
mod export_tests;
mod ingest_tests;
mod migration_tests;
mod store_tests;
