//! Error kind enumeration for categorizing engine errors.

/// Categorization of engine errors.
///
/// This enum provides a stable interface for matching on error types, enabling
/// different handling strategies for different failure modes.
///
/// ## Fatal vs Entity-Local
///
/// | ErrorKind         | Scope        | Action                              |
/// |-------------------|--------------|-------------------------------------|
/// | `Conflict`        | Entity-local | Re-fetch and merge (non-fatal)      |
/// | `NotFound`        | Entity-local | Fatal for the single operation      |
/// | `Transport`       | Entity-local | Recorded, the run continues         |
/// | `Timeout`         | Entity-local | Caller treats as `NotFound`         |
/// | `InvalidArgument` | Entity-local | Fix the declaration                 |
/// | `Parse`           | Run          | Malformed document, aborts the run  |
///
/// Entity-local errors are accumulated into the run report rather than
/// aborting the batch; only `Parse` stops an ingestion run outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Authentication failed (invalid or expired token).
    ///
    /// HTTP: 401 Unauthorized. Fix credentials and retry.
    #[error("unauthorized")]
    Unauthorized,

    /// Valid credentials but insufficient permissions on the remote store.
    ///
    /// HTTP: 403 Forbidden.
    #[error("forbidden")]
    Forbidden,

    /// Requested entity was not found in the remote model.
    ///
    /// HTTP: 404 Not Found. Fatal for the specific operation only.
    #[error("not found")]
    NotFound,

    /// A required input field is missing or malformed.
    ///
    /// HTTP: 400 Bad Request. Fatal to the single entity, non-fatal to
    /// the run.
    #[error("invalid argument")]
    InvalidArgument,

    /// The entity already exists in the remote model.
    ///
    /// HTTP: 409 Conflict, or a 4xx body carrying a `DUPLICATE_ENTITY`
    /// error code. Non-fatal: resolved by re-fetch and merge.
    #[error("duplicate entity")]
    Conflict,

    /// Rate limit exceeded.
    ///
    /// HTTP: 429 Too Many Requests.
    #[error("rate limited")]
    RateLimited,

    /// Remote store temporarily unavailable.
    ///
    /// HTTP: 503 Service Unavailable.
    #[error("service unavailable")]
    Unavailable,

    /// Polling budget exhausted while waiting for an eventually-consistent
    /// read to reflect a completed write.
    ///
    /// Callers treat this the same as `NotFound`.
    #[error("consistency timeout")]
    Timeout,

    /// Internal server error on the remote store.
    ///
    /// HTTP: 500 Internal Server Error.
    #[error("internal error")]
    Internal,

    /// Network-level failure talking to the remote store.
    #[error("transport error")]
    Transport,

    /// The remote store returned a response the engine could not decode.
    #[error("invalid response")]
    InvalidResponse,

    /// The input specification document is malformed.
    ///
    /// Fatal to the whole ingestion run.
    #[error("parse error")]
    Parse,

    /// Client-side configuration error (bad URL, missing scope, ...).
    #[error("configuration error")]
    Configuration,
}

impl ErrorKind {
    /// Returns `true` if the error is a duplicate-entity conflict.
    ///
    /// Conflicts are the one error class reconciliation treats as success:
    /// the entity exists, so the desired state is reachable via re-fetch.
    #[inline]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ErrorKind::Conflict)
    }

    /// Returns `true` if the error is generally safe to retry.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Unavailable
                | ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::Transport
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_duplicate() {
        assert!(ErrorKind::Conflict.is_duplicate());
        assert!(!ErrorKind::NotFound.is_duplicate());
        assert!(!ErrorKind::Transport.is_duplicate());
    }

    #[test]
    fn test_is_retriable() {
        assert!(ErrorKind::Unavailable.is_retriable());
        assert!(ErrorKind::Timeout.is_retriable());
        assert!(ErrorKind::RateLimited.is_retriable());
        assert!(!ErrorKind::Conflict.is_retriable());
        assert!(!ErrorKind::Parse.is_retriable());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorKind::Conflict.to_string(), "duplicate entity");
        assert_eq!(ErrorKind::Timeout.to_string(), "consistency timeout");
    }
}
