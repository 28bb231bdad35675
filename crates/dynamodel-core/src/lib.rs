//! Core runtime for DynaModel: native and wire values, schema adapters,
//! table/index descriptors, records with dirty tracking, the store boundary,
//! and observability.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod schema;
pub mod value;

pub use error::Error;

///
/// CONSTANTS
///

/// Maximum number of write requests accepted by one batch-write call.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// Default byte budget of one query/scan page.
pub const DEFAULT_PAGE_SIZE_BYTES: usize = 1024 * 1024;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No stores, serializers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            Connection,
            expr::{Condition, UpdateAction},
            query::{Query, Scan},
            record::{Record, SaveOptions},
        },
        model::{
            Model,
            index::{IndexSpec, Projection},
            table::{StreamViewType, TableSpec},
        },
        schema::{Field, FieldKind, Fragment, Schema, SchemaAdapter},
        value::{Value, Values},
    };
}
