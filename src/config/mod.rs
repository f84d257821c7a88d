//! Engine configuration.
//!
//! All tunables are explicit policy objects injected at construction time,
//! never ambient globals. [`BackoffPolicy`] drives the eventual-consistency
//! polling in the reconciliation engine; [`IngestOptions`] carries the
//! ingestion pipeline's knobs (settle delay, routing namespace).

mod backoff;

pub use backoff::BackoffPolicy;

use std::time::Duration;

/// Options for a specification ingestion run.
///
/// ## Example
///
/// ```rust
/// use policysync::config::IngestOptions;
/// use std::time::Duration;
///
/// let options = IngestOptions::new()
///     .with_settle_delay(Duration::from_millis(250))
///     .with_mapping_namespace("api-gateway");
/// ```
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Delay inserted between relation creation and derivation creation.
    ///
    /// Bounds the eventual-consistency window of the remote store: a
    /// derivation created immediately after its relation may observe a
    /// stale read. Tuned against observed store behavior, not throttling.
    pub settle_delay: Duration,

    /// Namespace key under which routing rules are batch-replaced.
    pub mapping_namespace: String,

    /// Auth mechanism declared on the generated routing config.
    pub mapping_auth_mechanism: String,

    /// Token header secret declared on the generated routing config.
    pub mapping_secret: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            mapping_namespace: "openapi".to_string(),
            mapping_auth_mechanism: "Bearer".to_string(),
            mapping_secret: "openapi_token".to_string(),
        }
    }
}

impl IngestOptions {
    /// Creates ingestion options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the settle delay between relation and derivation phases.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the routing-rule namespace key.
    #[must_use]
    pub fn with_mapping_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.mapping_namespace = namespace.into();
        self
    }

    /// Sets the auth mechanism declared on the routing config.
    #[must_use]
    pub fn with_mapping_auth_mechanism(mut self, mechanism: impl Into<String>) -> Self {
        self.mapping_auth_mechanism = mechanism.into();
        self
    }

    /// Sets the token secret declared on the routing config.
    #[must_use]
    pub fn with_mapping_secret(mut self, secret: impl Into<String>) -> Self {
        self.mapping_secret = secret.into();
        self
    }
}
