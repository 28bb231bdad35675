//! Store boundary: the narrow synchronous interface every persistence call
//! goes through, its wire request types, and the in-memory implementation.

mod connector;
mod memory;
mod request;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use thiserror::Error as ThisError;

// re-exports
pub use connector::{Connector, MemoryConnector, SharedStoreConnector};
pub use memory::{MemoryStore, StoreCall};
pub use request::*;

///
/// StoreError
/// Failures reported by a store; propagated to callers unmodified.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum StoreError {
    #[error("conditional check failed on table '{table}'")]
    ConditionalCheckFailed { table: String },

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("resource in use: {0}")]
    ResourceInUse(String),

    #[error("store rejected request: {0}")]
    Validation(String),

    #[error("request throttled on table '{table}'")]
    Throttled { table: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("{count} batch write item(s) left unprocessed on table '{table}'")]
    UnprocessedItems { table: String, count: usize },
}

impl StoreError {
    pub(crate) fn not_found(table: &str) -> Self {
        Self::ResourceNotFound(format!("table '{table}'"))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

///
/// Store
///
/// Blocking client interface to a DynamoDB-style service. Each call is one
/// round trip; implementations must be shareable across threads.
///

pub trait Store: Send + Sync {
    fn create_table(&self, request: CreateTableRequest) -> Result<TableDescription, StoreError>;

    fn describe_table(&self, table_name: &str) -> Result<TableDescription, StoreError>;

    fn update_table(&self, request: UpdateTableRequest) -> Result<TableDescription, StoreError>;

    fn delete_table(&self, table_name: &str) -> Result<(), StoreError>;

    fn put_item(&self, request: PutItemRequest) -> Result<(), StoreError>;

    fn get_item(&self, request: GetItemRequest) -> Result<Option<crate::value::Item>, StoreError>;

    fn update_item(&self, request: UpdateItemRequest) -> Result<UpdateItemOutput, StoreError>;

    fn delete_item(&self, request: DeleteItemRequest) -> Result<(), StoreError>;

    fn query(&self, request: QueryRequest) -> Result<PageOutput, StoreError>;

    fn scan(&self, request: ScanRequest) -> Result<PageOutput, StoreError>;

    fn batch_write_item(&self, request: BatchWriteRequest) -> Result<BatchWriteOutput, StoreError>;
}

pub type SharedStore = Arc<dyn Store>;
