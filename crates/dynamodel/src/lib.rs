//! ## Crate layout
//! - `config`: connection settings, per-table overrides and retry policy.
//! - `core`: values, schemas, models, records, queries and the store boundary.
//! - `error`: the stable public error type.
//!
//! The `prelude` module holds the vocabulary needed to declare a model and
//! work with its records.

pub use dynamodel_config as config;
pub use dynamodel_core as core;

pub mod error;

pub use core::{db, model, obs, schema, value};
pub use error::{Error, ErrorKind};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        config::{ConnectionConfig, Settings},
        core::{
            db::{
                Connection,
                expr::{Condition, UpdateAction},
                query::{Page, Query, Scan},
                record::{Record, SaveOptions},
            },
            model::{
                Model, UpdateOptions,
                index::{IndexSpec, Projection},
                table::{StreamViewType, TableSpec},
            },
            schema::{Field, FieldKind, Fragment, Schema, SchemaAdapter, validator},
            value::{Value, Values, values},
        },
        error::{Error, ErrorKind},
    };
}
