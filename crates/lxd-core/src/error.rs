//! Error types for LXD operations.
//!
//! Every failure the client can surface is a variant of [`Error`]. Variants that stem from a
//! malformed daemon reply carry the offending raw data so callers can inspect it.

use serde_json::Value;
use thiserror::Error;

use crate::response::StatusCode;

/// Main error type for LXD operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Base URL or reference could not be turned into an API path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Response carried a non-JSON content type
    #[error("Response is not JSON: {content_type} while expecting application/json (HTTP {status})")]
    ContentType {
        /// HTTP status of the response
        status: u16,
        /// Content type reported by the daemon
        content_type: String,
    },

    /// Response body could not be decoded as JSON
    #[error("Response is not JSON: failed to decode body (HTTP {status}): {cause}")]
    Decode {
        /// HTTP status of the response
        status: u16,
        /// Decoder error message
        cause: String,
    },

    /// Envelope has no `type` field
    #[error("Response has no type: {0}")]
    MissingDiscriminant(Value),

    /// Envelope `type` is not one of `sync`, `async`, `error`
    #[error("Invalid response type: {variant}")]
    UnknownVariant {
        /// Discriminant value found in the envelope
        variant: String,
        /// Raw envelope
        envelope: Value,
    },

    /// Envelope lacks a field its variant requires
    #[error("Response is missing required field `{field}`")]
    MissingField {
        /// Name of the missing field
        field: &'static str,
        /// Raw envelope
        envelope: Value,
    },

    /// Envelope field has the wrong JSON type
    #[error("Response field `{field}` must be {expected}")]
    InvalidField {
        /// Name of the offending field
        field: &'static str,
        /// Expected JSON shape
        expected: &'static str,
        /// Raw envelope
        envelope: Value,
    },

    /// Status or error code outside the known enumeration
    #[error("Unknown status code: {code}")]
    UnknownStatusCode {
        /// Raw integer code
        code: i64,
        /// Raw envelope
        envelope: Value,
    },

    /// Daemon answered with HTTP 5xx
    #[error("Server error: {status} {reason}")]
    Server {
        /// HTTP status
        status: u16,
        /// Canonical reason phrase
        reason: String,
    },

    /// Daemon replied with an error envelope where success was expected
    #[error("LXD error ({code}): {message}")]
    Api {
        /// Error code from the envelope
        code: StatusCode,
        /// Error message from the envelope
        message: String,
    },

    /// Envelope variant differs from what the call expects
    #[error("Unexpected response variant: expected {expected}, got {found}")]
    UnexpectedVariant {
        /// Expected variant name
        expected: &'static str,
        /// Received variant name
        found: &'static str,
    },

    /// Metadata has a shape the caller cannot use
    #[error("Unexpected metadata shape: expected {expected}, got {found}")]
    UnexpectedShape {
        /// Expected shape
        expected: &'static str,
        /// Received shape
        found: &'static str,
    },

    /// Entity data failed schema validation
    #[error("Validation error for {entity} at `{field}`: {message}")]
    Validation {
        /// Entity kind being validated
        entity: &'static str,
        /// Path of the offending field (`$` when the whole object is at fault)
        field: String,
        /// Validator message
        message: String,
    },

    /// Entity data accessed before it was fetched
    #[error("{entity} not fetched: {operation}")]
    NotFetched {
        /// Entity kind
        entity: &'static str,
        /// Operation reference the entity would be fetched from
        operation: String,
    },

    /// Fetch attempted on an entity without an operation reference
    #[error("{0} has no operation reference")]
    OperationMissing(&'static str),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Request timed out inside the HTTP client
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Daemon could not be reached
    #[error("Daemon unreachable: {0}")]
    Unreachable(String),

    /// HTTP backend was closed
    #[error("HTTP backend is closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

/// Specialized result type for LXD operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::ContentType { .. } => "CONTENT_TYPE",
            Self::Decode { .. } => "DECODE",
            Self::MissingDiscriminant(_) => "MISSING_DISCRIMINANT",
            Self::UnknownVariant { .. } => "UNKNOWN_VARIANT",
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::UnknownStatusCode { .. } => "UNKNOWN_STATUS_CODE",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::UnexpectedVariant { .. } => "UNEXPECTED_VARIANT",
            Self::UnexpectedShape { .. } => "UNEXPECTED_SHAPE",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFetched { .. } => "NOT_FETCHED",
            Self::OperationMissing(_) => "OPERATION_MISSING",
            Self::Http(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Unreachable(_) => "UNREACHABLE",
            Self::Closed => "CLOSED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Encode(_) => "ENCODE_ERROR",
        }
    }

    /// Returns true if the daemon sent something this client cannot interpret.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ContentType { .. }
                | Self::Decode { .. }
                | Self::MissingDiscriminant(_)
                | Self::UnknownVariant { .. }
                | Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::UnknownStatusCode { .. }
        )
    }

    /// Returns true if the daemon reported a not-found condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Api {
                code: StatusCode::NotFound,
                ..
            }
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidPath(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::InvalidPath("ftp://x".to_string()).error_code(),
            "INVALID_PATH"
        );
        assert_eq!(
            Error::MissingDiscriminant(json!({})).error_code(),
            "MISSING_DISCRIMINANT"
        );
        assert_eq!(
            Error::Server {
                status: 503,
                reason: "Service Unavailable".to_string()
            }
            .error_code(),
            "SERVER_ERROR"
        );
        assert_eq!(Error::OperationMissing("Instance").error_code(), "OPERATION_MISSING");
        assert_eq!(Error::Closed.error_code(), "CLOSED");
    }

    #[test]
    fn test_error_display() {
        let err = Error::Server {
            status: 503,
            reason: "Service Unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Server error: 503 Service Unavailable");

        let err = Error::NotFetched {
            entity: "Instance",
            operation: "/1.0/instances/web".to_string(),
        };
        assert_eq!(err.to_string(), "Instance not fetched: /1.0/instances/web");

        let err = Error::Api {
            code: StatusCode::NotFound,
            message: "Instance not found".to_string(),
        };
        assert_eq!(err.to_string(), "LXD error (404 NotFound): Instance not found");
    }

    #[test]
    fn test_protocol_error_classification() {
        assert!(Error::MissingDiscriminant(json!({})).is_protocol_error());
        assert!(Error::Decode {
            status: 200,
            cause: "eof".to_string()
        }
        .is_protocol_error());
        assert!(!Error::Closed.is_protocol_error());
        assert!(!Error::Server {
            status: 500,
            reason: String::new()
        }
        .is_protocol_error());
    }

    #[test]
    fn test_is_not_found() {
        let err = Error::Api {
            code: StatusCode::NotFound,
            message: "missing".to_string(),
        };
        assert!(err.is_not_found());
        let err = Error::Api {
            code: StatusCode::Failure,
            message: "boom".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let lxd_err: Error = err.into();
        assert!(matches!(lxd_err, Error::InvalidPath(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let lxd_err: Error = err.into();
        assert!(matches!(lxd_err, Error::Encode(_)));
    }

    #[test]
    fn test_error_clone_and_eq() {
        let err = Error::MissingField {
            field: "operation",
            envelope: json!({"type": "async"}),
        };
        assert_eq!(err.clone(), err);
        assert_ne!(err, Error::Closed);
    }
}
