//! Error types for the policysync engine.
//!
//! ## Key Invariant
//!
//! Entity-level failures are values, not panics: every reconciliation
//! operation returns a tagged `Result`, and pipeline phases accumulate
//! failures into error/warning lists so one bad entity never stops a batch.
//! Only a malformed input document ([`ErrorKind::Parse`]) aborts a run.

mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

/// A specialized `Result` type for policysync operations.
pub type Result<T> = std::result::Result<T, Error>;
