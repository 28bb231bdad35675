use derive_more::Display;
use dynamodel_core::{Error as CoreError, db::store::StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<CoreError> for Error {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();

        let kind = match err {
            CoreError::Definition { .. } => ErrorKind::Definition,
            CoreError::MissingTableAttribute { attribute, .. } => {
                ErrorKind::MissingTableAttribute { attribute }
            }
            CoreError::InvalidSchemaField { field, .. } => ErrorKind::InvalidSchemaField { field },
            CoreError::Validation(err) => ErrorKind::Validation {
                fields: err.errors,
            },
            CoreError::Convert(_) => ErrorKind::Validation {
                fields: BTreeMap::new(),
            },
            CoreError::HashKeyExists { .. } => ErrorKind::HashKeyExists,
            CoreError::InvalidQuery { .. } => ErrorKind::InvalidQuery,
            CoreError::TableNotActive { .. } => ErrorKind::Store(StoreErrorKind::NotActive),
            CoreError::Store(err) => ErrorKind::Store(err.into()),
        };

        Self::new(kind, message)
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// The model declaration is malformed.
    Definition,

    /// A required declarative attribute is absent.
    MissingTableAttribute { attribute: String },

    /// A declared key names a field the schema does not have.
    InvalidSchemaField { field: String },

    /// Field validation failed; messages keyed by field name.
    Validation { fields: BTreeMap<String, Vec<String>> },

    /// A unique save collided with an existing item.
    HashKeyExists,

    /// The query cannot be expressed against the table's keys.
    InvalidQuery,

    Store(StoreErrorKind),
}

///
/// StoreErrorKind
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum StoreErrorKind {
    ConditionFailed,
    NotFound,
    InUse,
    Rejected,
    Throttled,
    Unavailable,
    Unprocessed,
    NotActive,
}

impl From<StoreError> for StoreErrorKind {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConditionalCheckFailed { .. } => Self::ConditionFailed,
            StoreError::ResourceNotFound(_) => Self::NotFound,
            StoreError::ResourceInUse(_) => Self::InUse,
            StoreError::Validation(_) => Self::Rejected,
            StoreError::Throttled { .. } => Self::Throttled,
            StoreError::Transport(_) => Self::Unavailable,
            StoreError::UnprocessedItems { .. } => Self::Unprocessed,
        }
    }
}

///
/// TESTS
///
