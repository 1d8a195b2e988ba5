//! Classification of the daemon's response envelope.
//!
//! Every LXD reply is a JSON object whose `type` field selects one of three shapes. The
//! classifier validates the fields each shape requires and produces a [`Response`]; nothing
//! outside the selected shape is kept.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Status and error codes used by the daemon.
///
/// Codes 100–113 describe operation lifecycle states, 200 and above are outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum StatusCode {
    /// Operation created
    OperationCreated = 100,
    /// Started
    Started = 101,
    /// Stopped
    Stopped = 102,
    /// Running
    Running = 103,
    /// Canceling
    Canceling = 104,
    /// Pending
    Pending = 105,
    /// Starting
    Starting = 106,
    /// Stopping
    Stopping = 107,
    /// Aborting
    Aborting = 108,
    /// Freezing
    Freezing = 109,
    /// Frozen
    Frozen = 110,
    /// Thawed
    Thawed = 111,
    /// Error
    Error = 112,
    /// Ready
    Ready = 113,
    /// Success
    Success = 200,
    /// Failure
    Failure = 400,
    /// Canceled
    Canceled = 401,
    /// Not found
    NotFound = 404,
}

impl StatusCode {
    /// Looks up a code in the fixed enumeration.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            100 => Self::OperationCreated,
            101 => Self::Started,
            102 => Self::Stopped,
            103 => Self::Running,
            104 => Self::Canceling,
            105 => Self::Pending,
            106 => Self::Starting,
            107 => Self::Stopping,
            108 => Self::Aborting,
            109 => Self::Freezing,
            110 => Self::Frozen,
            111 => Self::Thawed,
            112 => Self::Error,
            113 => Self::Ready,
            200 => Self::Success,
            400 => Self::Failure,
            401 => Self::Canceled,
            404 => Self::NotFound,
            _ => return None,
        })
    }

    /// Returns the integer code.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Returns the code's name as the daemon spells it.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OperationCreated => "OperationCreated",
            Self::Started => "Started",
            Self::Stopped => "Stopped",
            Self::Running => "Running",
            Self::Canceling => "Canceling",
            Self::Pending => "Pending",
            Self::Starting => "Starting",
            Self::Stopping => "Stopping",
            Self::Aborting => "Aborting",
            Self::Freezing => "Freezing",
            Self::Frozen => "Frozen",
            Self::Thawed => "Thawed",
            Self::Error => "Error",
            Self::Ready => "Ready",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Canceled => "Canceled",
            Self::NotFound => "NotFound",
        }
    }

    /// True for operation lifecycle states (100–113).
    #[must_use]
    pub const fn is_lifecycle(self) -> bool {
        (self as u16) < 200
    }

    /// True once an operation can no longer change state.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::Canceled | Self::NotFound | Self::Error
        )
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = String;

    fn try_from(code: u16) -> std::result::Result<Self, String> {
        Self::from_code(i64::from(code)).ok_or_else(|| format!("unknown status code {code}"))
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.name())
    }
}

/// Envelope `metadata` payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Metadata {
    /// `null` or absent
    #[default]
    Null,
    /// JSON object
    Object(Map<String, Value>),
    /// JSON array
    Array(Vec<Value>),
}

impl Metadata {
    /// Short name of the shape, used in error messages.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
        }
    }

    /// Returns the object payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedShape`] for arrays and null.
    pub fn into_object(self) -> Result<Map<String, Value>> {
        match self {
            Self::Object(map) => Ok(map),
            other => Err(Error::UnexpectedShape {
                expected: "object",
                found: other.shape(),
            }),
        }
    }

    /// Returns the array payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedShape`] for objects and null.
    pub fn into_array(self) -> Result<Vec<Value>> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(Error::UnexpectedShape {
                expected: "array",
                found: other.shape(),
            }),
        }
    }

    /// Converts back into a plain JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Object(map) => Value::Object(map),
            Self::Array(items) => Value::Array(items),
        }
    }
}

/// Successful, synchronous reply.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResponse {
    /// Status description
    pub status: String,
    /// Status code
    pub status_code: StatusCode,
    /// Payload
    pub metadata: Metadata,
}

/// Reply announcing a background operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncResponse {
    /// Status description
    pub status: String,
    /// Status code
    pub status_code: StatusCode,
    /// Operation reference, e.g. `/1.0/operations/<uuid>`
    pub operation: String,
    /// Payload (usually the operation object)
    pub metadata: Metadata,
}

/// Error reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub error_code: StatusCode,
    /// Payload
    pub metadata: Metadata,
}

/// A classified envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `"type": "sync"`
    Sync(SyncResponse),
    /// `"type": "async"`
    Async(AsyncResponse),
    /// `"type": "error"`
    Error(ErrorResponse),
}

impl Response {
    /// Classifies a decoded envelope.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MissingDiscriminant`], [`Error::UnknownVariant`],
    /// [`Error::MissingField`], [`Error::InvalidField`] or [`Error::UnknownStatusCode`]
    /// when the envelope does not match the shape its `type` selects.
    pub fn classify(envelope: Value) -> Result<Self> {
        let Some(kind) = envelope.get("type") else {
            return Err(Error::MissingDiscriminant(envelope));
        };
        let Some(kind) = kind.as_str() else {
            return Err(Error::UnknownVariant {
                variant: kind.to_string(),
                envelope,
            });
        };

        match kind {
            "sync" => Ok(Self::Sync(SyncResponse {
                status: string_field(&envelope, "status")?,
                status_code: code_field(&envelope, "status_code")?,
                metadata: metadata_field(&envelope)?,
            })),
            "async" => Ok(Self::Async(AsyncResponse {
                status: string_field(&envelope, "status")?,
                status_code: code_field(&envelope, "status_code")?,
                operation: string_field(&envelope, "operation")?,
                metadata: metadata_field(&envelope)?,
            })),
            "error" => Ok(Self::Error(ErrorResponse {
                error: string_field(&envelope, "error")?,
                error_code: code_field(&envelope, "error_code")?,
                metadata: metadata_field(&envelope)?,
            })),
            other => Err(Error::UnknownVariant {
                variant: other.to_string(),
                envelope,
            }),
        }
    }

    /// Name of the active variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Sync(_) => "sync",
            Self::Async(_) => "async",
            Self::Error(_) => "error",
        }
    }

    /// Borrows the payload of whichever variant is active.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        match self {
            Self::Sync(resp) => &resp.metadata,
            Self::Async(resp) => &resp.metadata,
            Self::Error(resp) => &resp.metadata,
        }
    }

    /// Takes the payload of whichever variant is active.
    #[must_use]
    pub fn into_metadata(self) -> Metadata {
        match self {
            Self::Sync(resp) => resp.metadata,
            Self::Async(resp) => resp.metadata,
            Self::Error(resp) => resp.metadata,
        }
    }

    /// Requires a sync reply.
    ///
    /// # Errors
    ///
    /// Error envelopes become [`Error::Api`]; async replies become
    /// [`Error::UnexpectedVariant`].
    pub fn into_sync(self) -> Result<SyncResponse> {
        match self {
            Self::Sync(resp) => Ok(resp),
            Self::Error(resp) => Err(resp.into()),
            Self::Async(_) => Err(Error::UnexpectedVariant {
                expected: "sync",
                found: "async",
            }),
        }
    }

    /// Requires an async reply.
    ///
    /// # Errors
    ///
    /// Error envelopes become [`Error::Api`]; sync replies become
    /// [`Error::UnexpectedVariant`].
    pub fn into_async(self) -> Result<AsyncResponse> {
        match self {
            Self::Async(resp) => Ok(resp),
            Self::Error(resp) => Err(resp.into()),
            Self::Sync(_) => Err(Error::UnexpectedVariant {
                expected: "async",
                found: "sync",
            }),
        }
    }

    /// Accepts sync or async replies and returns the payload.
    ///
    /// # Errors
    ///
    /// Error envelopes become [`Error::Api`].
    pub fn into_success(self) -> Result<Metadata> {
        match self {
            Self::Error(resp) => Err(resp.into()),
            other => Ok(other.into_metadata()),
        }
    }
}

impl From<ErrorResponse> for Error {
    fn from(resp: ErrorResponse) -> Self {
        Self::Api {
            code: resp.error_code,
            message: resp.error,
        }
    }
}

fn invalid_field(envelope: &Value, field: &'static str, expected: &'static str) -> Error {
    Error::InvalidField {
        field,
        expected,
        envelope: envelope.clone(),
    }
}

fn required<'a>(envelope: &'a Value, field: &'static str) -> Result<&'a Value> {
    envelope.get(field).ok_or_else(|| Error::MissingField {
        field,
        envelope: envelope.clone(),
    })
}

fn string_field(envelope: &Value, field: &'static str) -> Result<String> {
    required(envelope, field)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid_field(envelope, field, "a string"))
}

fn code_field(envelope: &Value, field: &'static str) -> Result<StatusCode> {
    let code = required(envelope, field)?
        .as_i64()
        .ok_or_else(|| invalid_field(envelope, field, "an integer"))?;
    StatusCode::from_code(code).ok_or_else(|| Error::UnknownStatusCode {
        code,
        envelope: envelope.clone(),
    })
}

fn metadata_field(envelope: &Value) -> Result<Metadata> {
    match envelope.get("metadata") {
        None | Some(Value::Null) => Ok(Metadata::Null),
        Some(Value::Object(map)) => Ok(Metadata::Object(map.clone())),
        Some(Value::Array(items)) => Ok(Metadata::Array(items.clone())),
        Some(_) => Err(invalid_field(envelope, "metadata", "an object, array or null")),
    }
}
