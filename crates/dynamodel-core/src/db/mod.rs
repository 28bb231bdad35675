//! Persistence: records, queries, expressions, the store boundary and the
//! connection models are built against.

pub(crate) mod batch;
mod connection;
pub mod expr;
pub mod query;
pub mod record;
pub mod store;
pub mod tracked;

// re-exports
pub use connection::Connection;
