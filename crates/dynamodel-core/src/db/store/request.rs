use crate::{
    db::expr::{Expression, ExpressionBuilder, WireCondition, WireKeyCondition, WireUpdateAction},
    value::{AttributeValue, Item, ScalarType},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Table administration
// ============================================================================

///
/// KeySchema
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeySchema {
    pub hash: String,
    pub range: Option<String>,
}

impl KeySchema {
    #[must_use]
    pub fn new(hash: impl Into<String>, range: Option<String>) -> Self {
        Self {
            hash: hash.into(),
            range,
        }
    }

    /// Key attribute names, hash first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.hash.as_str()).chain(self.range.as_deref())
    }
}

///
/// AttributeDefinition
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub ty: ScalarType,
}

///
/// Throughput
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[display("{read}r/{write}w")]
pub struct Throughput {
    pub read: u64,
    pub write: u64,
}

impl Throughput {
    #[must_use]
    pub const fn new(read: u64, write: u64) -> Self {
        Self { read, write }
    }
}

///
/// BillingMode
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum BillingMode {
    Provisioned(Throughput),
    PayPerRequest,
}

impl BillingMode {
    #[must_use]
    pub const fn throughput(&self) -> Option<Throughput> {
        match self {
            Self::Provisioned(t) => Some(*t),
            Self::PayPerRequest => None,
        }
    }
}

///
/// StreamViewType
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum StreamViewType {
    #[display("KEYS_ONLY")]
    KeysOnly,
    #[display("NEW_IMAGE")]
    NewImage,
    #[display("OLD_IMAGE")]
    OldImage,
    #[display("NEW_AND_OLD_IMAGES")]
    NewAndOldImages,
}

///
/// Projection
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Projection {
    All,
    KeysOnly,
    Include(BTreeSet<String>),
}

impl Projection {
    pub fn include<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::Include(fields.into_iter().map(Into::into).collect())
    }
}

///
/// IndexDefinition
/// Physical description of a secondary index as sent to the store.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexDefinition {
    pub name: String,
    pub key_schema: KeySchema,
    pub projection: Projection,
    pub throughput: Option<Throughput>,
}

///
/// CreateTableRequest
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CreateTableRequest {
    pub table_name: String,
    pub key_schema: KeySchema,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing: BillingMode,
    pub stream: Option<StreamViewType>,
    pub global_indexes: Vec<IndexDefinition>,
    pub local_indexes: Vec<IndexDefinition>,
}

///
/// TableStatus
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum TableStatus {
    #[display("CREATING")]
    Creating,
    #[display("UPDATING")]
    Updating,
    #[display("DELETING")]
    Deleting,
    #[display("ACTIVE")]
    Active,
}

///
/// IndexDescription
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexDescription {
    pub name: String,
    pub key_schema: KeySchema,
    pub projection: Projection,
    pub throughput: Option<Throughput>,
    pub status: TableStatus,
}

impl IndexDescription {
    #[must_use]
    pub fn definition(&self) -> IndexDefinition {
        IndexDefinition {
            name: self.name.clone(),
            key_schema: self.key_schema.clone(),
            projection: self.projection.clone(),
            throughput: self.throughput,
        }
    }
}

///
/// TableDescription
/// Live remote definition, as returned by describe.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableDescription {
    pub table_name: String,
    pub status: TableStatus,
    pub key_schema: KeySchema,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing: BillingMode,
    pub stream: Option<StreamViewType>,
    pub global_indexes: Vec<IndexDescription>,
    pub local_indexes: Vec<IndexDescription>,
    pub item_count: u64,
}

///
/// StreamUpdate
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StreamUpdate {
    Enable(StreamViewType),
    Disable,
}

///
/// IndexUpdate
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum IndexUpdate {
    Create(IndexDefinition),
    Update { name: String, throughput: Throughput },
    Delete { name: String },
}

///
/// UpdateTableRequest
///
/// One table mutation. A remote store accepts at most one index change per
/// call, so reconciliation issues several of these.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct UpdateTableRequest {
    pub table_name: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing: Option<BillingMode>,
    pub stream: Option<StreamUpdate>,
    pub index_update: Option<IndexUpdate>,
}

impl UpdateTableRequest {
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Items
// ============================================================================

///
/// ReturnValues
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum ReturnValues {
    #[default]
    #[display("NONE")]
    None,
    #[display("UPDATED_NEW")]
    UpdatedNew,
    #[display("ALL_NEW")]
    AllNew,
    #[display("UPDATED_OLD")]
    UpdatedOld,
    #[display("ALL_OLD")]
    AllOld,
}

///
/// PutItemRequest
///

#[derive(Clone, Debug, PartialEq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Item,
    pub condition: Option<WireCondition>,
}

///
/// GetItemRequest
///

#[derive(Clone, Debug, PartialEq)]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: Item,
    pub consistent_read: bool,
}

///
/// UpdateItemRequest
///

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: Item,
    pub actions: Vec<WireUpdateAction>,
    pub condition: Option<WireCondition>,
    pub return_values: ReturnValues,
}

///
/// UpdateItemOutput
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateItemOutput {
    pub attributes: Option<Item>,
}

///
/// DeleteItemRequest
///

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: Item,
    pub condition: Option<WireCondition>,
}

// ============================================================================
// Reads
// ============================================================================

///
/// QueryRequest
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub key_condition: WireKeyCondition,
    pub filter: Option<WireCondition>,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
    pub consistent_read: bool,
    pub scan_forward: bool,
}

///
/// ScanRequest
///

#[derive(Clone, Debug, PartialEq)]
pub struct ScanRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub filter: Option<WireCondition>,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
    pub consistent_read: bool,
}

///
/// PageOutput
/// One page of a query or scan.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageOutput {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

// ============================================================================
// Batches
// ============================================================================

///
/// WriteRequest
///

#[derive(Clone, Debug, PartialEq)]
pub enum WriteRequest {
    Put(Item),
    Delete(Item),
}

///
/// BatchWriteRequest
///

#[derive(Clone, Debug, PartialEq)]
pub struct BatchWriteRequest {
    pub table_name: String,
    pub requests: Vec<WriteRequest>,
}

///
/// BatchWriteOutput
/// Requests the store did not process; the caller retries them.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchWriteOutput {
    pub unprocessed: Vec<WriteRequest>,
}

// ============================================================================
// Rendering
// ============================================================================

///
/// RenderedExpressions
///
/// Expression strings of one request with a shared placeholder table, ready
/// for a remote store that speaks the textual expression language.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderedExpressions {
    pub key_condition: Option<String>,
    pub update: Option<String>,
    pub condition: Option<String>,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, AttributeValue>,
}

impl RenderedExpressions {
    fn build(
        key_condition: Option<&WireKeyCondition>,
        actions: &[WireUpdateAction],
        condition: Option<&WireCondition>,
    ) -> Self {
        let mut b = ExpressionBuilder::new();
        let key_condition = key_condition.map(|k| b.key_condition(k));
        let update = (!actions.is_empty()).then(|| b.update(actions));
        let condition = condition.map(|c| b.condition(c));
        let Expression { names, values, .. } = b.finish(String::new());

        Self {
            key_condition,
            update,
            condition,
            names,
            values,
        }
    }
}

impl PutItemRequest {
    #[must_use]
    pub fn render(&self) -> RenderedExpressions {
        RenderedExpressions::build(None, &[], self.condition.as_ref())
    }
}

impl UpdateItemRequest {
    #[must_use]
    pub fn render(&self) -> RenderedExpressions {
        RenderedExpressions::build(None, &self.actions, self.condition.as_ref())
    }
}

impl DeleteItemRequest {
    #[must_use]
    pub fn render(&self) -> RenderedExpressions {
        RenderedExpressions::build(None, &[], self.condition.as_ref())
    }
}

impl QueryRequest {
    #[must_use]
    pub fn render(&self) -> RenderedExpressions {
        RenderedExpressions::build(Some(&self.key_condition), &[], self.filter.as_ref())
    }
}

impl ScanRequest {
    #[must_use]
    pub fn render(&self) -> RenderedExpressions {
        RenderedExpressions::build(None, &[], self.filter.as_ref())
    }
}
