use crate::{
    schema::validator::Validator,
    value::{ScalarType, Value, parse_ulid, parse_uuid},
};
use derive_more::Display;
use std::{fmt, sync::Arc};

///
/// FieldKind
///
/// Native base kind of a field. Every field type, however derived, reports
/// one of these.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum FieldKind {
    #[display("text")]
    Text,
    #[display("int")]
    Int,
    #[display("float")]
    Float,
    #[display("bool")]
    Bool,
    #[display("binary")]
    Binary,
    #[display("ulid")]
    Ulid,
    #[display("uuid")]
    Uuid,
    #[display("list")]
    List,
    #[display("map")]
    Map,
    #[display("text set")]
    TextSet,
}

impl FieldKind {
    /// Wire key type for kinds that may be used as table or index keys.
    #[must_use]
    pub const fn scalar_type(self) -> Option<ScalarType> {
        match self {
            Self::Text | Self::Ulid | Self::Uuid => Some(ScalarType::S),
            Self::Int | Self::Float => Some(ScalarType::N),
            Self::Binary => Some(ScalarType::B),
            Self::Bool | Self::List | Self::Map | Self::TextSet => None,
        }
    }

    /// Convert a compatible value into this kind.
    pub fn coerce(self, value: &Value) -> Result<Value, String> {
        let coerced = match (self, value) {
            (Self::Text, Value::Text(_))
            | (Self::Int, Value::Int(_))
            | (Self::Float, Value::Float(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Binary, Value::Blob(_))
            | (Self::Ulid, Value::Ulid(_))
            | (Self::Uuid, Value::Uuid(_))
            | (Self::List, Value::List(_))
            | (Self::Map, Value::Map(_))
            | (Self::TextSet, Value::TextSet(_)) => value.clone(),

            (Self::Text, Value::Ulid(id)) => Value::Text(id.to_string()),
            (Self::Text, Value::Uuid(id)) => Value::Text(id.hyphenated().to_string()),

            (Self::Int, Value::Text(s)) => Value::Int(
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| format!("'{s}' is not a valid integer"))?,
            ),
            #[expect(clippy::cast_precision_loss)]
            (Self::Float, Value::Int(n)) => Value::Float(*n as f64),
            (Self::Float, Value::Text(s)) => Value::Float(
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("'{s}' is not a valid number"))?,
            ),

            (Self::Ulid, Value::Text(s)) => {
                Value::Ulid(parse_ulid(s).map_err(|e| e.to_string())?)
            }
            (Self::Uuid, Value::Text(s)) => {
                Value::Uuid(parse_uuid(s).map_err(|e| e.to_string())?)
            }

            (Self::TextSet, Value::List(items)) => Value::TextSet(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Text(s) => Ok(s.clone()),
                        other => Err(format!("text set cannot hold {}", other.label())),
                    })
                    .collect::<Result<_, _>>()?,
            ),

            (kind, other) => return Err(format!("expected {kind}, found {}", other.label())),
        };

        Ok(coerced)
    }
}

///
/// FieldType
///
/// A field's type. Custom types may refine checking but always report a
/// base `FieldKind`.
///

pub trait FieldType: fmt::Debug + Send + Sync {
    fn kind(&self) -> FieldKind;

    fn type_name(&self) -> &str;

    /// Coerce and check one present value.
    fn check(&self, value: &Value) -> Result<Value, String> {
        self.kind().coerce(value)
    }
}

impl FieldType for FieldKind {
    fn kind(&self) -> FieldKind {
        *self
    }

    fn type_name(&self) -> &str {
        match self {
            Self::Text => "Text",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Bool => "Bool",
            Self::Binary => "Binary",
            Self::Ulid => "Ulid",
            Self::Uuid => "Uuid",
            Self::List => "List",
            Self::Map => "Map",
            Self::TextSet => "TextSet",
        }
    }
}

///
/// DerivedType
/// A named refinement of another field type.
///

#[derive(Debug)]
pub struct DerivedType {
    name: String,
    parent: Arc<dyn FieldType>,
}

impl DerivedType {
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Arc<dyn FieldType>) -> Self {
        Self {
            name: name.into(),
            parent,
        }
    }

    #[must_use]
    pub fn parent(&self) -> &dyn FieldType {
        self.parent.as_ref()
    }
}

impl FieldType for DerivedType {
    fn kind(&self) -> FieldKind {
        self.parent.kind()
    }

    fn type_name(&self) -> &str {
        &self.name
    }

    fn check(&self, value: &Value) -> Result<Value, String> {
        self.parent.check(value)
    }
}

///
/// Field
///
/// Uniform field descriptor: type, required flag and validators.
///

#[derive(Clone)]
pub struct Field {
    ty: Arc<dyn FieldType>,
    required: bool,
    validators: Vec<Arc<dyn Validator>>,
}

impl Field {
    #[must_use]
    pub fn of(ty: impl FieldType + 'static) -> Self {
        Self::from_shared(Arc::new(ty))
    }

    #[must_use]
    pub fn from_shared(ty: Arc<dyn FieldType>) -> Self {
        Self {
            ty,
            required: false,
            validators: Vec::new(),
        }
    }

    #[must_use]
    pub fn text() -> Self {
        Self::of(FieldKind::Text)
    }

    #[must_use]
    pub fn int() -> Self {
        Self::of(FieldKind::Int)
    }

    /// Alias of `int`.
    #[must_use]
    pub fn number() -> Self {
        Self::int()
    }

    #[must_use]
    pub fn float() -> Self {
        Self::of(FieldKind::Float)
    }

    #[must_use]
    pub fn bool() -> Self {
        Self::of(FieldKind::Bool)
    }

    #[must_use]
    pub fn binary() -> Self {
        Self::of(FieldKind::Binary)
    }

    #[must_use]
    pub fn ulid() -> Self {
        Self::of(FieldKind::Ulid)
    }

    #[must_use]
    pub fn uuid() -> Self {
        Self::of(FieldKind::Uuid)
    }

    #[must_use]
    pub fn list() -> Self {
        Self::of(FieldKind::List)
    }

    #[must_use]
    pub fn map() -> Self {
        Self::of(FieldKind::Map)
    }

    #[must_use]
    pub fn text_set() -> Self {
        Self::of(FieldKind::TextSet)
    }

    /// Derive a new named type from this field's type, keeping its kind.
    #[must_use]
    pub fn derived(&self, name: impl Into<String>) -> Self {
        Self {
            ty: Arc::new(DerivedType::new(name, Arc::clone(&self.ty))),
            required: self.required,
            validators: self.validators.clone(),
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.ty.kind()
    }

    #[must_use]
    pub fn is_kind(&self, kind: FieldKind) -> bool {
        self.kind() == kind
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.ty.type_name()
    }

    #[must_use]
    pub fn field_type(&self) -> &dyn FieldType {
        self.ty.as_ref()
    }

    /// Coerce a present value and run every validator, collecting messages.
    pub fn validate(&self, value: &Value) -> Result<Value, Vec<String>> {
        let value = self.ty.check(value).map_err(|e| vec![e])?;

        let errors: Vec<String> = self
            .validators
            .iter()
            .filter_map(|v| v.validate(&value).err())
            .collect();

        if errors.is_empty() {
            Ok(value)
        } else {
            Err(errors)
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("type", &self.ty.type_name())
            .field("kind", &self.kind())
            .field("required", &self.required)
            .field("validators", &self.validators.len())
            .finish()
    }
}
