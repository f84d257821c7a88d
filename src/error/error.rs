//! Main error type for the policysync engine.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use super::ErrorKind;

/// The primary error type for policysync operations.
///
/// `Error` provides the context phases need to decide whether a failure is
/// entity-local or fatal:
/// - [`kind()`](Error::kind): categorization for `match` statements
/// - [`status()`](Error::status): the remote HTTP status, when one exists
/// - [`is_duplicate()`](Error::is_duplicate): quick reconciliation decision
///
/// ## Example
///
/// ```rust
/// use policysync::{Error, ErrorKind};
///
/// fn handle(err: Error) {
///     match err.kind() {
///         ErrorKind::Conflict => {
///             // entity already exists: re-fetch and merge
///         }
///         ErrorKind::Parse => {
///             // malformed document: abort the run
///         }
///         _ => {
///             // record and continue with the next entity
///             eprintln!("entity failed: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    /// The error category.
    kind: ErrorKind,

    /// Human-readable error message.
    message: Cow<'static, str>,

    /// The remote HTTP status code, when the error came from the store.
    status: Option<u16>,

    /// The underlying error, if any.
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a new error with the given kind and message.
    ///
    /// # Example
    ///
    /// ```rust
    /// use policysync::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::InvalidArgument, "base_role is required");
    /// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates an error from a kind with a default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        let message = match kind {
            ErrorKind::Unauthorized => "authentication failed",
            ErrorKind::Forbidden => "permission denied",
            ErrorKind::NotFound => "entity not found",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Conflict => "entity already exists",
            ErrorKind::RateLimited => "rate limit exceeded",
            ErrorKind::Unavailable => "service unavailable",
            ErrorKind::Timeout => "consistency polling budget exhausted",
            ErrorKind::Internal => "internal server error",
            ErrorKind::Transport => "transport failure",
            ErrorKind::InvalidResponse => "undecodable response",
            ErrorKind::Parse => "malformed specification document",
            ErrorKind::Configuration => "configuration error",
        };
        Self::new(kind, message)
    }

    /// Returns the error kind for categorization.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the remote HTTP status code, if this error carries one.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns `true` if this is a duplicate-entity conflict.
    ///
    /// Equivalent to `self.kind().is_duplicate()`.
    #[inline]
    pub fn is_duplicate(&self) -> bool {
        self.kind.is_duplicate()
    }

    /// Sets the remote HTTP status for this error.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source error for this error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors for common error types

    /// Creates a not found error.
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Creates a duplicate-entity conflict error.
    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Creates a consistency timeout error.
    pub fn timeout(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Creates a parse error for a malformed specification document.
    pub fn parse(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if let Some(status) = self.status {
            write!(f, " (status: {})", status)?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Forbidden,
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::Transport,
        };
        Error::new(kind, err.to_string()).with_source(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::configuration(format!("invalid URL: {}", err)).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::parse(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Transport
        } else if err.is_decode() {
            ErrorKind::InvalidResponse
        } else {
            ErrorKind::Transport
        };
        Error::new(kind, err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_new() {
        let err = Error::new(ErrorKind::InvalidArgument, "test message");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("test message"));
        assert!(err.status().is_none());
    }

    #[test]
    fn test_error_from_kind() {
        let err = Error::from_kind(ErrorKind::Conflict);
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_error_with_status() {
        let err = Error::conflict("role exists").with_status(409);
        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().contains("409"));
    }

    #[test]
    fn test_is_duplicate() {
        assert!(Error::conflict("dup").is_duplicate());
        assert!(!Error::not_found("missing").is_duplicate());
    }

    #[test]
    fn test_error_with_source() {
        let io_err = std::io::Error::other("underlying error");
        let err = Error::transport("request failed").with_source(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_convenience_constructors() {
        assert_eq!(Error::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(Error::invalid_argument("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(Error::conflict("x").kind(), ErrorKind::Conflict);
        assert_eq!(Error::timeout("x").kind(), ErrorKind::Timeout);
        assert_eq!(Error::transport("x").kind(), ErrorKind::Transport);
        assert_eq!(Error::parse("x").kind(), ErrorKind::Parse);
        assert_eq!(Error::configuration("x").kind(), ErrorKind::Configuration);
        assert_eq!(Error::internal("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
