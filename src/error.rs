use serde_derive::{Deserialize, Serialize};

use crate::access::Permission;

/// Result returning Error
pub type Result<T> = std::result::Result<T, Error>;

/// vaultDB errors. All except Internal are considered user-facing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    Config(String),
    Internal(String),
    Io(String),
    Parse(String),
    UnknownStatementType(String),
    Validation(String),
    TableNotFound(String),
    TableAlreadyExists(String),
    IndexNotFound(String),
    IndexAlreadyExists(String),
    ColumnNotFound(String),
    ColumnCountMismatch { columns: usize, values: usize },
    InvalidParameterCount { expected: usize, actual: usize },
    PermissionDenied(Permission),
    Constraint(String),
    DecryptionFailure,
    Snapshot(String),
    Serialization(String),
    Transaction(String),
    Unsupported(String),
    Value(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Config(s)
            | Error::Internal(s)
            | Error::Io(s)
            | Error::Parse(s)
            | Error::Validation(s)
            | Error::Constraint(s)
            | Error::Snapshot(s)
            | Error::Serialization(s)
            | Error::Transaction(s)
            | Error::Value(s) => write!(f, "{}", s),
            Error::UnknownStatementType(token) => write!(f, "Unknown statement type: {}", token),
            Error::TableNotFound(table) => write!(f, "Table {} does not exist", table),
            Error::TableAlreadyExists(table) => write!(f, "Table {} already exists", table),
            Error::IndexNotFound(index) => write!(f, "Index {} does not exist", index),
            Error::IndexAlreadyExists(index) => write!(f, "Index {} already exists", index),
            Error::ColumnNotFound(column) => write!(f, "Column {} does not exist", column),
            Error::ColumnCountMismatch { columns, values } => {
                write!(f, "Column count mismatch: {} columns, {} values", columns, values)
            },
            Error::InvalidParameterCount { expected, actual } => {
                write!(f, "Invalid parameter count: expected {}, got {}", expected, actual)
            },
            Error::PermissionDenied(permission) => write!(f, "Permission denied: {}", permission),
            Error::DecryptionFailure => write!(f, "Snapshot decryption failed"),
            Error::Unsupported(what) => write!(f, "Unsupported: {}", what),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Value(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::Parse(err.to_string())
    }
}
