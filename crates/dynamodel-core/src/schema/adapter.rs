use crate::{
    schema::{
        Field, Fragment,
        fragment::{merge_fields, merge_fragments},
    },
    value::Values,
};
use indexmap::IndexMap;
use std::{collections::BTreeMap, fmt};
use thiserror::Error as ThisError;

///
/// ValidationError
///
/// Field name → messages. The rendered message enumerates the failing
/// field names.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("Validation failed for schema {schema}. Errors: {errors:?}")]
pub struct ValidationError {
    pub schema: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    #[must_use]
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            errors: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.errors.keys().map(String::as_str).collect()
    }
}

///
/// SchemaAdapter
///
/// Capability boundary to a field-validation backend. Implementors only need
/// to describe their fields; `validate` has a default that follows the
/// declared field descriptors.
///

pub trait SchemaAdapter: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Merged field set in resolution order.
    fn fields(&self) -> &IndexMap<String, Field>;

    fn field(&self, name: &str) -> Option<&Field> {
        self.fields().get(name)
    }

    /// Validate and normalize `values`. With `partial`, absent required
    /// fields are not reported; present fields are still fully checked.
    fn validate(&self, values: &Values, partial: bool) -> Result<Values, ValidationError> {
        validate_fields(self.name(), self.fields(), values, partial)
    }
}

/// Shared validation walk used by the default adapter behaviour.
pub fn validate_fields(
    schema: &str,
    fields: &IndexMap<String, Field>,
    values: &Values,
    partial: bool,
) -> Result<Values, ValidationError> {
    let mut err = ValidationError::new(schema);
    let mut out = Values::new();

    for name in values.keys() {
        if !fields.contains_key(name) {
            err.push(name.clone(), "unknown field");
        }
    }

    for (name, field) in fields {
        match values.get(name).filter(|v| !v.is_null()) {
            Some(value) => match field.validate(value) {
                Ok(normalized) => {
                    out.insert(name.clone(), normalized);
                }
                Err(messages) => {
                    for message in messages {
                        err.push(name.clone(), message);
                    }
                }
            },
            None if field.is_required() && !partial => {
                err.push(name.clone(), "missing required field");
            }
            None => {}
        }
    }

    if err.is_empty() { Ok(out) } else { Err(err) }
}

///
/// Schema
/// Built-in schema adapter over an ordered, flattened field set.
///

#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    fields: IndexMap<String, Field>,
}

impl Schema {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            parents: Vec::new(),
            fields: IndexMap::new(),
        }
    }
}

impl SchemaAdapter for Schema {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &IndexMap<String, Field> {
        &self.fields
    }
}

///
/// SchemaBuilder
///

#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    name: String,
    parents: Vec<Fragment>,
    fields: IndexMap<String, Field>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn extends(mut self, fragment: Fragment) -> Self {
        self.parents.push(fragment);
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    #[must_use]
    pub fn build(self) -> Schema {
        let mut fields = IndexMap::new();
        merge_fragments(&mut fields, &self.parents);
        merge_fields(&mut fields, &self.fields);

        Schema {
            name: self.name,
            fields,
        }
    }
}
