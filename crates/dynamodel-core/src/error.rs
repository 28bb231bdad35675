use crate::{db::store::StoreError, schema::ValidationError, value::ConvertError};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Root of the DynaModel error taxonomy. Definition errors are raised while a
/// model is composed, before any remote call; capacity errors surface when a
/// table is created or updated.
///

#[derive(Debug, ThisError)]
pub enum Error {
    /// The model is malformed in a way not covered by a more specific variant.
    #[error("invalid model '{model}': {message}")]
    Definition { model: String, message: String },

    /// A required declarative attribute is absent.
    #[error("{owner} is missing required attribute '{attribute}'")]
    MissingTableAttribute { owner: String, attribute: String },

    /// A declared key references a field that is not in the schema.
    #[error("{owner}.{attribute} references unknown schema field '{field}'")]
    InvalidSchemaField {
        owner: String,
        attribute: String,
        field: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A unique save collided with an existing primary key.
    #[error("an item with the same primary key already exists in table '{table}'")]
    HashKeyExists { table: String },

    /// A query or scan could not be expressed against the table's keys.
    #[error("invalid query on '{target}': {message}")]
    InvalidQuery { target: String, message: String },

    /// A table did not reach ACTIVE within the configured wait.
    #[error("table '{table}' not active after {attempts} attempt(s)")]
    TableNotActive { table: String, attempts: u32 },

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub(crate) fn definition(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Definition {
            model: model.into(),
            message: message.into(),
        }
    }

    pub(crate) fn missing_attribute(owner: impl Into<String>, attribute: &str) -> Self {
        Self::MissingTableAttribute {
            owner: owner.into(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn invalid_field(
        owner: impl Into<String>,
        attribute: &str,
        field: impl Into<String>,
    ) -> Self {
        Self::InvalidSchemaField {
            owner: owner.into(),
            attribute: attribute.to_string(),
            field: field.into(),
        }
    }

    pub(crate) fn invalid_query(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Stable classification of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Definition { .. } | Self::MissingTableAttribute { .. } => ErrorClass::Definition,
            Self::InvalidSchemaField { .. } => ErrorClass::Schema,
            Self::Validation(_) | Self::Convert(_) => ErrorClass::Validation,
            Self::HashKeyExists { .. } => ErrorClass::Conflict,
            Self::InvalidQuery { .. } => ErrorClass::Query,
            Self::TableNotActive { .. } | Self::Store(_) => ErrorClass::Store,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}: {self}", self.class())
    }
}

///
/// ErrorClass
/// Coarse taxonomy for callers that only branch on the kind of failure.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Definition,
    Schema,
    Validation,
    Conflict,
    Query,
    Store,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Definition => "definition",
            Self::Schema => "schema",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Query => "query",
            Self::Store => "store",
        };
        write!(f, "{label}")
    }
}
