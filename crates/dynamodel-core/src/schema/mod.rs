//! Field declarations, schema composition and validation.

mod adapter;
mod field;
mod fragment;
pub mod validator;

#[cfg(test)]
mod tests;

// re-exports
pub use adapter::{Schema, SchemaAdapter, SchemaBuilder, ValidationError, validate_fields};
pub use field::{DerivedType, Field, FieldKind, FieldType};
pub use fragment::Fragment;
