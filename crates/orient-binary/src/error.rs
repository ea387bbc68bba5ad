//! Error types for binary record serialization.

use thiserror::Error;

/// Errors that can occur while encoding or decoding binary records.
#[derive(Error, Debug)]
pub enum BinaryError {
    #[error("Unexpected end of stream: need {needed} bytes, have {available}")]
    UnexpectedEndOfStream { needed: usize, available: usize },

    #[error("Varint not terminated within {max_bytes} bytes")]
    VarintTooLong { max_bytes: usize },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Global property {0} not found in schema")]
    GlobalPropertyNotFound(i32),

    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("Unsupported serialization version: {0}")]
    UnsupportedVersion(u8),

    #[error("Nesting depth limit of {0} exceeded")]
    DepthLimitExceeded(usize),

    #[error("Link bag of {len} entries exceeds the embedded threshold of {threshold}")]
    RemoteBagRequired { len: usize, threshold: usize },

    #[error("Remote link bag call failed: {0}")]
    Remote(String),

    #[error("Field '{name}': {source}")]
    Field {
        name: String,
        #[source]
        source: Box<BinaryError>,
    },
}

impl BinaryError {
    /// Create a malformed record error from a message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    /// Create a type mismatch error.
    pub fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Attach a field name to this error. Already-attributed errors are kept as is,
    /// so the innermost failing field is the one reported.
    pub fn in_field(self, name: &str) -> Self {
        match self {
            Self::Field { .. } => self,
            other => Self::Field {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any field attribution removed.
    pub fn root_cause(&self) -> &BinaryError {
        match self {
            Self::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Name of the field the error was raised for, if known.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Field { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns `true` if the input ended before a complete value was read.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self.root_cause(), Self::UnexpectedEndOfStream { .. })
    }

    /// Returns `true` if a value disagreed with its declared type.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.root_cause(), Self::TypeMismatch { .. })
    }

    /// Returns `true` if the record structure itself is invalid.
    pub fn is_malformed(&self) -> bool {
        matches!(self.root_cause(), Self::MalformedRecord(_))
    }

    /// Returns `true` if a type tag is not supported by this codec.
    pub fn is_unsupported_type(&self) -> bool {
        matches!(self.root_cause(), Self::UnsupportedType(_))
    }
}
