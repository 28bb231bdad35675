mod wire;


use crate::schema::FieldKind;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;
use ulid::Ulid;
use uuid::Uuid;

// re-exports
pub use wire::{AttributeValue, Item, ScalarType, item_size};

///
/// Values
/// Native field values of one record, keyed by field name.
///

pub type Values = BTreeMap<String, Value>;

///
/// ConvertError
///

#[derive(Debug, ThisError)]
pub enum ConvertError {
    #[error("number {0} cannot be stored (not finite)")]
    NonFinite(f64),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid {kind} '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("expected {expected} for field '{field}', found wire type {found}")]
    Mismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

///
/// Value
///
/// Native value of one field.
///
/// Null → the field is absent; saving a Null writes nothing for it.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Ulid(Ulid),
    Uuid(Uuid),
    List(Vec<Self>),
    Map(BTreeMap<String, Self>),
    TextSet(BTreeSet<String>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view used by range validators.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Label of the variant, used in validation messages.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Ulid(_) => "ulid",
            Self::Uuid(_) => "uuid",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::TextSet(_) => "text set",
        }
    }

    /// Encode into the store's wire form.
    pub fn to_wire(&self) -> Result<AttributeValue, ConvertError> {
        let av = match self {
            Self::Null => AttributeValue::Null(true),
            Self::Bool(b) => AttributeValue::Bool(*b),
            Self::Int(n) => AttributeValue::N(n.to_string()),
            Self::Float(n) => {
                if !n.is_finite() {
                    return Err(ConvertError::NonFinite(*n));
                }
                AttributeValue::N(n.to_string())
            }
            Self::Text(s) => AttributeValue::S(s.clone()),
            Self::Blob(b) => AttributeValue::B(b.clone()),
            Self::Ulid(id) => AttributeValue::S(id.to_string()),
            Self::Uuid(id) => AttributeValue::S(id.hyphenated().to_string()),
            Self::List(items) => AttributeValue::L(
                items
                    .iter()
                    .map(Self::to_wire)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Self::Map(map) => AttributeValue::M(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_wire()?)))
                    .collect::<Result<BTreeMap<_, _>, ConvertError>>()?,
            ),
            Self::TextSet(set) => AttributeValue::Ss(set.iter().cloned().collect()),
        };

        Ok(av)
    }

    /// Decode a wire value, guided by the declared field kind when known.
    pub fn from_wire(
        field: &str,
        av: &AttributeValue,
        kind: Option<FieldKind>,
    ) -> Result<Self, ConvertError> {
        let mismatch = |expected: &'static str| ConvertError::Mismatch {
            field: field.to_string(),
            expected,
            found: av.tag(),
        };

        let value = match (kind, av) {
            (_, AttributeValue::Null(_)) => Self::Null,

            (Some(FieldKind::Ulid), AttributeValue::S(s)) => Self::Ulid(parse_ulid(s)?),
            (Some(FieldKind::Uuid), AttributeValue::S(s)) => Self::Uuid(parse_uuid(s)?),
            (Some(FieldKind::Ulid | FieldKind::Uuid), _) => return Err(mismatch("S")),

            (Some(FieldKind::Int), AttributeValue::N(n)) => Self::Int(
                n.parse::<i64>()
                    .map_err(|_| ConvertError::InvalidNumber(n.clone()))?,
            ),
            (Some(FieldKind::Float), AttributeValue::N(n)) => Self::Float(parse_float(n)?),
            (Some(FieldKind::Int | FieldKind::Float), _) => return Err(mismatch("N")),

            (Some(FieldKind::Text), AttributeValue::S(s)) => Self::Text(s.clone()),
            (Some(FieldKind::Text), _) => return Err(mismatch("S")),

            (Some(FieldKind::Binary), AttributeValue::B(b)) => Self::Blob(b.clone()),
            (Some(FieldKind::Binary), _) => return Err(mismatch("B")),

            (Some(FieldKind::Bool), AttributeValue::Bool(b)) => Self::Bool(*b),
            (Some(FieldKind::Bool), _) => return Err(mismatch("BOOL")),

            (Some(FieldKind::TextSet), AttributeValue::Ss(items)) => {
                Self::TextSet(items.iter().cloned().collect())
            }
            (Some(FieldKind::TextSet), _) => return Err(mismatch("SS")),

            (Some(FieldKind::List), AttributeValue::L(_))
            | (Some(FieldKind::Map), AttributeValue::M(_))
            | (None, _) => Self::from_wire_untyped(av)?,
            (Some(FieldKind::List), _) => return Err(mismatch("L")),
            (Some(FieldKind::Map), _) => return Err(mismatch("M")),
        };

        Ok(value)
    }

    // Decode without a declared kind: integers stay integers when they fit.
    fn from_wire_untyped(av: &AttributeValue) -> Result<Self, ConvertError> {
        let value = match av {
            AttributeValue::S(s) => Self::Text(s.clone()),
            AttributeValue::N(n) => match n.parse::<i64>() {
                Ok(i) => Self::Int(i),
                Err(_) => Self::Float(parse_float(n)?),
            },
            AttributeValue::B(b) => Self::Blob(b.clone()),
            AttributeValue::Bool(b) => Self::Bool(*b),
            AttributeValue::Null(_) => Self::Null,
            AttributeValue::L(items) => Self::List(
                items
                    .iter()
                    .map(Self::from_wire_untyped)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            AttributeValue::M(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::from_wire_untyped(v)?)))
                    .collect::<Result<BTreeMap<_, _>, ConvertError>>()?,
            ),
            AttributeValue::Ss(items) => Self::TextSet(items.iter().cloned().collect()),
            AttributeValue::Ns(items) => Self::List(
                items
                    .iter()
                    .map(|n| Self::from_wire_untyped(&AttributeValue::N(n.clone())))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        Ok(value)
    }
}

pub(crate) fn parse_ulid(s: &str) -> Result<Ulid, ConvertError> {
    Ulid::from_string(s).map_err(|_| ConvertError::InvalidIdentifier {
        kind: "ulid",
        value: s.to_string(),
    })
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, ConvertError> {
    Uuid::parse_str(s).map_err(|_| ConvertError::InvalidIdentifier {
        kind: "uuid",
        value: s.to_string(),
    })
}

fn parse_float(n: &str) -> Result<f64, ConvertError> {
    n.parse::<f64>()
        .map_err(|_| ConvertError::InvalidNumber(n.to_string()))
}

///
/// From conversions
///

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<Ulid> for Value {
    fn from(value: Ulid) -> Self {
        Self::Ulid(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Build a `Values` map from `(name, value)` pairs.
pub fn values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Values
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
