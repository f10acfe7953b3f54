use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable identifiers for schema-definition failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaErrorCode {
    ParseError,
    MalformedSchema,
    InvalidPattern,
    UnknownValidator,
    UnknownInclude,
    CyclicInclude,
    IoError,
}

impl SchemaErrorCode {
    /// Returns the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaErrorCode::ParseError => "PARSE_ERROR",
            SchemaErrorCode::MalformedSchema => "MALFORMED_SCHEMA",
            SchemaErrorCode::InvalidPattern => "INVALID_PATTERN",
            SchemaErrorCode::UnknownValidator => "UNKNOWN_VALIDATOR",
            SchemaErrorCode::UnknownInclude => "UNKNOWN_INCLUDE",
            SchemaErrorCode::CyclicInclude => "CYCLIC_INCLUDE",
            SchemaErrorCode::IoError => "IO_ERROR",
        }
    }

    /// Returns the standard human-readable message for the error code
    pub fn message(&self) -> &'static str {
        match self {
            SchemaErrorCode::ParseError => "Schema could not be parsed",
            SchemaErrorCode::MalformedSchema => "Schema is malformed",
            SchemaErrorCode::InvalidPattern => "Name pattern is not a valid regular expression",
            SchemaErrorCode::UnknownValidator => "Validator reference could not be resolved",
            SchemaErrorCode::UnknownInclude => "Included definition does not exist",
            SchemaErrorCode::CyclicInclude => "Schema includes itself",
            SchemaErrorCode::IoError => "Schema file could not be read",
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fatal errors in a schema description, raised at import time.
///
/// Every variant carries the location of the offending element inside the
/// schema description, e.g. `root.children[1].cardinality`.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema parse error at {location}: {message}")]
    Parse { location: String, message: String },

    #[error("Malformed schema at {location}: {reason}")]
    Malformed { location: String, reason: String },

    #[error("Invalid name pattern '{pattern}' at {location}: {source}")]
    InvalidPattern {
        location: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown validator '{name}' referenced at {location}")]
    UnknownValidator { location: String, name: String },

    #[error("Unknown definition '{name}' included at {location}")]
    UnknownInclude { location: String, name: String },

    #[error("Cyclic include at {location}: {}", .chain.join(" -> "))]
    CyclicInclude { location: String, chain: Vec<String> },

    #[error("Failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SchemaError {
    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::Malformed {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> SchemaErrorCode {
        match self {
            SchemaError::Parse { .. } => SchemaErrorCode::ParseError,
            SchemaError::Malformed { .. } => SchemaErrorCode::MalformedSchema,
            SchemaError::InvalidPattern { .. } => SchemaErrorCode::InvalidPattern,
            SchemaError::UnknownValidator { .. } => SchemaErrorCode::UnknownValidator,
            SchemaError::UnknownInclude { .. } => SchemaErrorCode::UnknownInclude,
            SchemaError::CyclicInclude { .. } => SchemaErrorCode::CyclicInclude,
            SchemaError::Io { .. } => SchemaErrorCode::IoError,
        }
    }

    /// Location inside the schema description (or the file path for I/O failures)
    pub fn location(&self) -> &str {
        match self {
            SchemaError::Parse { location, .. }
            | SchemaError::Malformed { location, .. }
            | SchemaError::InvalidPattern { location, .. }
            | SchemaError::UnknownValidator { location, .. }
            | SchemaError::UnknownInclude { location, .. }
            | SchemaError::CyclicInclude { location, .. } => location,
            SchemaError::Io { path, .. } => path,
        }
    }
}
