use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

///
/// Item
/// One stored row in wire form, keyed by attribute name.
///

pub type Item = BTreeMap<String, AttributeValue>;

///
/// AttributeValue
///
/// Wire representation of a single attribute, serialized in the store's
/// native JSON shape (`{"S": "x"}`, `{"N": "1"}`, ...).
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),

    /// Numbers travel as decimal strings.
    #[serde(rename = "N")]
    N(String),

    #[serde(rename = "B")]
    B(Vec<u8>),

    #[serde(rename = "BOOL")]
    Bool(bool),

    #[serde(rename = "NULL")]
    Null(bool),

    #[serde(rename = "L")]
    L(Vec<Self>),

    #[serde(rename = "M")]
    M(BTreeMap<String, Self>),

    #[serde(rename = "SS")]
    Ss(Vec<String>),

    #[serde(rename = "NS")]
    Ns(Vec<String>),
}

impl AttributeValue {
    /// Scalar key type of this value, if it can be used in a key.
    #[must_use]
    pub const fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Self::S(_) => Some(ScalarType::S),
            Self::N(_) => Some(ScalarType::N),
            Self::B(_) => Some(ScalarType::B),
            _ => None,
        }
    }

    /// Short wire tag, used in diagnostics.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
        }
    }

    /// Approximate stored size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::S(s) | Self::N(s) => s.len(),
            Self::B(b) => b.len(),
            Self::Bool(_) | Self::Null(_) => 1,
            Self::L(items) => 3 + items.iter().map(|v| 1 + v.size()).sum::<usize>(),
            Self::M(map) => {
                3 + map
                    .iter()
                    .map(|(k, v)| 1 + k.len() + v.size())
                    .sum::<usize>()
            }
            Self::Ss(items) | Self::Ns(items) => items.iter().map(String::len).sum(),
        }
    }

    /// Compare two values the way key conditions and filters do: numbers
    /// numerically, strings and binaries lexicographically. Values of
    /// different or non-scalar types are not comparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::S(a), Self::S(b)) => Some(a.cmp(b)),
            (Self::B(a), Self::B(b)) => Some(a.cmp(b)),
            (Self::N(a), Self::N(b)) => {
                let a = a.parse::<f64>().ok()?;
                let b = b.parse::<f64>().ok()?;
                Some(a.total_cmp(&b))
            }
            (a, b) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

///
/// ScalarType
/// Key attribute types accepted by the store.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ScalarType {
    #[display("S")]
    S,
    #[display("N")]
    N,
    #[display("B")]
    B,
}

/// Approximate stored size of an item, counting attribute names.
#[must_use]
pub fn item_size(item: &Item) -> usize {
    item.iter().map(|(name, value)| name.len() + value.size()).sum()
}
