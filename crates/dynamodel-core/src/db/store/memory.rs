use crate::{
    DEFAULT_PAGE_SIZE_BYTES, MAX_BATCH_WRITE_ITEMS,
    db::{
        expr::{Comparison, Condition, RangeCondition, UpdateAction, WireCondition},
        store::{
            BatchWriteOutput, BatchWriteRequest, BillingMode, CreateTableRequest,
            DeleteItemRequest, GetItemRequest, IndexDescription, IndexUpdate, KeySchema,
            PageOutput, Projection, PutItemRequest, QueryRequest, ReturnValues, ScanRequest,
            Store, StoreError, StreamUpdate, TableDescription, TableStatus, UpdateItemOutput,
            UpdateItemRequest, UpdateTableRequest, WriteRequest,
        },
    },
    value::{AttributeValue, Item, item_size},
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, VecDeque},
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

///
/// StoreCall
/// One recorded call, kept for assertions on what reached the store.
///

#[derive(Clone, Debug, PartialEq)]
pub enum StoreCall {
    CreateTable(CreateTableRequest),
    DescribeTable(String),
    UpdateTable(UpdateTableRequest),
    DeleteTable(String),
    PutItem(PutItemRequest),
    GetItem(GetItemRequest),
    UpdateItem(UpdateItemRequest),
    DeleteItem(DeleteItemRequest),
    Query(QueryRequest),
    Scan(ScanRequest),
    BatchWriteItem(BatchWriteRequest),
}

///
/// MemoryStore
///
/// In-process store with DynamoDB item semantics: key schemas, sparse
/// secondary indexes with projections, conditional writes, update return
/// values, byte-limited pages and batch writes.
///

pub struct MemoryStore {
    state: Mutex<State>,
    page_size_bytes: usize,
    creating_polls: u32,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, MemTable>,
    calls: Vec<StoreCall>,
    unprocessed: VecDeque<usize>,
}

struct MemTable {
    description: TableDescription,
    items: BTreeMap<StorageKey, Item>,
    pending_polls: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryStore")
            .field("tables", &state.tables.keys().collect::<Vec<_>>())
            .field("calls", &state.calls.len())
            .field("page_size_bytes", &self.page_size_bytes)
            .finish()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size_bytes: DEFAULT_PAGE_SIZE_BYTES,
            creating_polls: 0,
        }
    }

    /// Byte budget of one query/scan page.
    #[must_use]
    pub const fn with_page_size(mut self, bytes: usize) -> Self {
        self.page_size_bytes = bytes;
        self
    }

    /// Number of describe calls a new table reports CREATING before ACTIVE.
    #[must_use]
    pub const fn with_creating_polls(mut self, polls: u32) -> Self {
        self.creating_polls = polls;
        self
    }

    /// Leave the trailing `count` requests of upcoming batch-write calls
    /// unprocessed, one entry per call.
    pub fn inject_unprocessed(&self, counts: impl IntoIterator<Item = usize>) {
        self.state().unprocessed.extend(counts);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    #[must_use]
    pub fn update_item_calls(&self) -> Vec<UpdateItemRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::UpdateItem(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn query_calls(&self) -> Vec<QueryRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::Query(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn update_table_calls(&self) -> Vec<UpdateTableRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::UpdateTable(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Stored items of a table, in key order.
    #[must_use]
    pub fn items(&self, table_name: &str) -> Vec<Item> {
        self.state()
            .tables
            .get(table_name)
            .map(|t| t.items.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_table(&self, table_name: &str) -> bool {
        self.state().tables.contains_key(table_name)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn table(&self, name: &str) -> Result<&MemTable, StoreError> {
        self.tables.get(name).ok_or_else(|| StoreError::not_found(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemTable, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::not_found(name))
    }
}

impl MemTable {
    fn key_schema(&self) -> &KeySchema {
        &self.description.key_schema
    }

    fn index(&self, name: &str) -> Result<&IndexDescription, StoreError> {
        self.description
            .global_indexes
            .iter()
            .chain(&self.description.local_indexes)
            .find(|i| i.name == name)
            .ok_or_else(|| {
                StoreError::validation(format!(
                    "table '{}' has no index '{name}'",
                    self.description.table_name
                ))
            })
    }

    fn is_global(&self, name: &str) -> bool {
        self.description.global_indexes.iter().any(|i| i.name == name)
    }

    fn storage_key(&self, item: &Item) -> Result<StorageKey, StoreError> {
        storage_key(self.key_schema(), item)
            .ok_or_else(|| StoreError::validation("item is missing a key attribute"))
    }

    // Keys must match the declared scalar types.
    fn check_key_types(&self, item: &Item) -> Result<(), StoreError> {
        for def in &self.description.attribute_definitions {
            if let Some(value) = item.get(&def.name)
                && value.scalar_type() != Some(def.ty)
            {
                return Err(StoreError::validation(format!(
                    "key attribute '{}' must be of type {}, found {}",
                    def.name,
                    def.ty,
                    value.tag()
                )));
            }
        }

        Ok(())
    }

    fn key_only(&self, item: &Item) -> Item {
        pick(item, self.key_schema().names())
    }

    fn refresh_item_count(&mut self) {
        self.description.item_count = self.items.len() as u64;
    }
}

// ============================================================================
// Keys
// ============================================================================

///
/// KeyPart
/// Scalar key value with store ordering (numbers compare numerically).
///

#[derive(Clone, Debug)]
struct KeyPart(AttributeValue);

impl KeyPart {
    const fn rank(&self) -> u8 {
        match self.0 {
            AttributeValue::S(_) => 0,
            AttributeValue::N(_) => 1,
            AttributeValue::B(_) => 2,
            _ => 3,
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .compare(&other.0)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

type StorageKey = (KeyPart, Option<KeyPart>);

fn key_part(item: &Item, name: &str) -> Option<KeyPart> {
    item.get(name)
        .filter(|v| v.scalar_type().is_some())
        .map(|v| KeyPart(v.clone()))
}

fn storage_key(schema: &KeySchema, item: &Item) -> Option<StorageKey> {
    let hash = key_part(item, &schema.hash)?;
    let range = match &schema.range {
        Some(range) => Some(key_part(item, range)?),
        None => None,
    };

    Some((hash, range))
}

// Read position of an item: index key parts (empty on the base table), then
// the table key. `None` when the item is not in the index.
type Position = (Vec<KeyPart>, StorageKey);

fn position(table: &KeySchema, index: Option<&KeySchema>, item: &Item) -> Option<Position> {
    let index_parts = match index {
        Some(schema) => {
            let (hash, range) = storage_key(schema, item)?;
            std::iter::once(hash).chain(range).collect()
        }
        None => Vec::new(),
    };

    Some((index_parts, storage_key(table, item)?))
}

fn pick<'a>(item: &Item, names: impl IntoIterator<Item = &'a str>) -> Item {
    names
        .into_iter()
        .filter_map(|n| item.get(n).map(|v| (n.to_string(), v.clone())))
        .collect()
}

// ============================================================================
// Conditions
// ============================================================================

fn evaluate(condition: &WireCondition, item: &Item) -> bool {
    match condition {
        Condition::Compare { field, op, value } => item.get(field).is_some_and(|a| {
            match a.compare(value) {
                Some(ord) => op.accepts(ord),
                None => *op == Comparison::Ne,
            }
        }),
        Condition::Between { field, low, high } => item.get(field).is_some_and(|a| {
            a.compare(low).is_some_and(|o| o != Ordering::Less)
                && a.compare(high).is_some_and(|o| o != Ordering::Greater)
        }),
        Condition::BeginsWith { field, prefix } => {
            item.get(field)
                .is_some_and(|a| match (a, prefix) {
                    (AttributeValue::S(s), AttributeValue::S(p)) => s.starts_with(p.as_str()),
                    (AttributeValue::B(b), AttributeValue::B(p)) => b.starts_with(p),
                    _ => false,
                })
        }
        Condition::Contains { field, value } => item.get(field).is_some_and(|a| match (a, value) {
            (AttributeValue::S(s), AttributeValue::S(sub)) => s.contains(sub.as_str()),
            (AttributeValue::Ss(set), AttributeValue::S(member))
            | (AttributeValue::Ns(set), AttributeValue::N(member)) => set.contains(member),
            (AttributeValue::L(items), v) => items.contains(v),
            _ => false,
        }),
        Condition::Exists(field) => item.contains_key(field),
        Condition::NotExists(field) => !item.contains_key(field),
        Condition::And(all) => all.iter().all(|c| evaluate(c, item)),
        Condition::Or(any) => any.iter().any(|c| evaluate(c, item)),
        Condition::Not(inner) => !evaluate(inner, item),
    }
}

fn range_matches(cond: &RangeCondition<AttributeValue>, value: &AttributeValue) -> bool {
    let cmp = |other: &AttributeValue| value.compare(other);
    match cond {
        RangeCondition::Eq(v) => cmp(v) == Some(Ordering::Equal),
        RangeCondition::Lt(v) => cmp(v) == Some(Ordering::Less),
        RangeCondition::Le(v) => matches!(cmp(v), Some(Ordering::Less | Ordering::Equal)),
        RangeCondition::Gt(v) => cmp(v) == Some(Ordering::Greater),
        RangeCondition::Ge(v) => matches!(cmp(v), Some(Ordering::Greater | Ordering::Equal)),
        RangeCondition::Between(low, high) => {
            matches!(cmp(low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(cmp(high), Some(Ordering::Less | Ordering::Equal))
        }
        RangeCondition::BeginsWith(p) => match (value, p) {
            (AttributeValue::S(s), AttributeValue::S(p)) => s.starts_with(p.as_str()),
            (AttributeValue::B(b), AttributeValue::B(p)) => b.starts_with(p),
            _ => false,
        },
    }
}

fn check_condition(
    table_name: &str,
    condition: Option<&WireCondition>,
    existing: Option<&Item>,
) -> Result<(), StoreError> {
    let Some(condition) = condition else {
        return Ok(());
    };

    let empty = Item::new();
    if evaluate(condition, existing.unwrap_or(&empty)) {
        Ok(())
    } else {
        Err(StoreError::ConditionalCheckFailed {
            table: table_name.to_string(),
        })
    }
}

// ============================================================================
// Updates
// ============================================================================

fn add_numbers(a: &str, b: &str) -> Result<String, StoreError> {
    if let (Ok(x), Ok(y)) = (a.parse::<i64>(), b.parse::<i64>()) {
        return x
            .checked_add(y)
            .map(|n| n.to_string())
            .ok_or_else(|| StoreError::validation("numeric overflow in ADD"));
    }

    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => Ok((x + y).to_string()),
        _ => Err(StoreError::validation("ADD requires numeric operands")),
    }
}

fn apply_add(
    current: Option<&AttributeValue>,
    delta: &AttributeValue,
) -> Result<AttributeValue, StoreError> {
    let value = match (current, delta) {
        (None, v) => v.clone(),
        (Some(AttributeValue::N(a)), AttributeValue::N(b)) => {
            AttributeValue::N(add_numbers(a, b)?)
        }
        (Some(AttributeValue::Ss(a)), AttributeValue::Ss(b)) => {
            let mut merged = a.clone();
            for v in b {
                if !merged.contains(v) {
                    merged.push(v.clone());
                }
            }
            AttributeValue::Ss(merged)
        }
        (Some(AttributeValue::Ns(a)), AttributeValue::Ns(b)) => {
            let mut merged = a.clone();
            for v in b {
                if !merged.contains(v) {
                    merged.push(v.clone());
                }
            }
            AttributeValue::Ns(merged)
        }
        (Some(current), delta) => {
            return Err(StoreError::validation(format!(
                "ADD cannot combine {} with {}",
                current.tag(),
                delta.tag()
            )));
        }
    };

    Ok(value)
}

// ============================================================================
// Store
// ============================================================================

impl Store for MemoryStore {
    fn create_table(&self, request: CreateTableRequest) -> Result<TableDescription, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::CreateTable(request.clone()));

        if state.tables.contains_key(&request.table_name) {
            return Err(StoreError::ResourceInUse(format!(
                "table '{}'",
                request.table_name
            )));
        }

        let defined = |name: &str| {
            request
                .attribute_definitions
                .iter()
                .any(|d| d.name == name)
        };
        let all_keys = std::iter::once(&request.key_schema).chain(
            request
                .global_indexes
                .iter()
                .chain(&request.local_indexes)
                .map(|i| &i.key_schema),
        );
        for key_schema in all_keys {
            if let Some(missing) = key_schema.names().find(|n| !defined(n)) {
                return Err(StoreError::validation(format!(
                    "key attribute '{missing}' has no attribute definition"
                )));
            }
        }

        let describe = |defs: &[crate::db::store::IndexDefinition]| {
            defs.iter()
                .map(|d| IndexDescription {
                    name: d.name.clone(),
                    key_schema: d.key_schema.clone(),
                    projection: d.projection.clone(),
                    throughput: d.throughput,
                    status: TableStatus::Active,
                })
                .collect::<Vec<_>>()
        };

        let status = if self.creating_polls > 0 {
            TableStatus::Creating
        } else {
            TableStatus::Active
        };

        let description = TableDescription {
            table_name: request.table_name.clone(),
            status,
            key_schema: request.key_schema.clone(),
            attribute_definitions: request.attribute_definitions.clone(),
            billing: request.billing,
            stream: request.stream,
            global_indexes: describe(&request.global_indexes),
            local_indexes: describe(&request.local_indexes),
            item_count: 0,
        };

        state.tables.insert(
            request.table_name,
            MemTable {
                description: description.clone(),
                items: BTreeMap::new(),
                pending_polls: self.creating_polls,
            },
        );

        Ok(description)
    }

    fn describe_table(&self, table_name: &str) -> Result<TableDescription, StoreError> {
        let mut state = self.state();
        state
            .calls
            .push(StoreCall::DescribeTable(table_name.to_string()));

        let table = state.table_mut(table_name)?;
        if table.description.status == TableStatus::Creating {
            if table.pending_polls == 0 {
                table.description.status = TableStatus::Active;
            } else {
                table.pending_polls -= 1;
            }
        }

        Ok(table.description.clone())
    }

    fn update_table(&self, request: UpdateTableRequest) -> Result<TableDescription, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::UpdateTable(request.clone()));

        let table = state.table_mut(&request.table_name)?;
        if request.billing.is_none() && request.stream.is_none() && request.index_update.is_none()
        {
            return Err(StoreError::validation("update_table requires at least one change"));
        }

        let desc = &mut table.description;

        if let Some(billing) = request.billing {
            desc.billing = billing;
        }

        match request.stream {
            Some(StreamUpdate::Enable(view)) => {
                if desc.stream.is_some() {
                    return Err(StoreError::validation(format!(
                        "table '{}' already has a stream enabled",
                        desc.table_name
                    )));
                }
                desc.stream = Some(view);
            }
            Some(StreamUpdate::Disable) => {
                if desc.stream.is_none() {
                    return Err(StoreError::validation(format!(
                        "table '{}' has no stream to disable",
                        desc.table_name
                    )));
                }
                desc.stream = None;
            }
            None => {}
        }

        match request.index_update {
            Some(IndexUpdate::Create(def)) => {
                if desc.global_indexes.iter().any(|i| i.name == def.name) {
                    return Err(StoreError::ResourceInUse(format!("index '{}'", def.name)));
                }
                if matches!(desc.billing, BillingMode::Provisioned(_)) && def.throughput.is_none() {
                    return Err(StoreError::validation(format!(
                        "index '{}' requires provisioned throughput",
                        def.name
                    )));
                }
                for attr in request.attribute_definitions {
                    if !desc.attribute_definitions.iter().any(|d| d.name == attr.name) {
                        desc.attribute_definitions.push(attr);
                    }
                }
                desc.global_indexes.push(IndexDescription {
                    name: def.name,
                    key_schema: def.key_schema,
                    projection: def.projection,
                    throughput: def.throughput,
                    status: TableStatus::Active,
                });
            }
            Some(IndexUpdate::Update { name, throughput }) => {
                let index = desc
                    .global_indexes
                    .iter_mut()
                    .find(|i| i.name == name)
                    .ok_or_else(|| StoreError::ResourceNotFound(format!("index '{name}'")))?;
                index.throughput = Some(throughput);
            }
            Some(IndexUpdate::Delete { name }) => {
                let before = desc.global_indexes.len();
                desc.global_indexes.retain(|i| i.name != name);
                if desc.global_indexes.len() == before {
                    return Err(StoreError::ResourceNotFound(format!("index '{name}'")));
                }
            }
            None => {}
        }

        Ok(desc.clone())
    }

    fn delete_table(&self, table_name: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::DeleteTable(table_name.to_string()));

        state
            .tables
            .remove(table_name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(table_name))
    }

    fn put_item(&self, request: PutItemRequest) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::PutItem(request.clone()));

        let table = state.table_mut(&request.table_name)?;
        table.check_key_types(&request.item)?;
        let key = table.storage_key(&request.item)?;

        check_condition(
            &request.table_name,
            request.condition.as_ref(),
            table.items.get(&key),
        )?;

        table.items.insert(key, request.item);
        table.refresh_item_count();

        Ok(())
    }

    fn get_item(&self, request: GetItemRequest) -> Result<Option<Item>, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::GetItem(request.clone()));

        let table = state.table(&request.table_name)?;
        if request.key.len() != table.key_schema().names().count() {
            return Err(StoreError::validation(
                "the provided key does not match the table key schema",
            ));
        }
        let key = table.storage_key(&request.key)?;

        Ok(table.items.get(&key).cloned())
    }

    fn update_item(&self, request: UpdateItemRequest) -> Result<UpdateItemOutput, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::UpdateItem(request.clone()));

        let table = state.table_mut(&request.table_name)?;
        table.check_key_types(&request.key)?;
        let key = table.storage_key(&request.key)?;
        let old = table.items.get(&key).cloned();

        check_condition(&request.table_name, request.condition.as_ref(), old.as_ref())?;

        let mut new = old.clone().unwrap_or_else(|| request.key.clone());
        for action in &request.actions {
            if table.key_schema().names().any(|n| n == action.field()) {
                return Err(StoreError::validation(format!(
                    "cannot update key attribute '{}'",
                    action.field()
                )));
            }

            match action {
                UpdateAction::Set(field, value) => {
                    new.insert(field.clone(), value.clone());
                }
                UpdateAction::Remove(field) => {
                    new.remove(field);
                }
                UpdateAction::Add(field, delta) => {
                    let value = apply_add(new.get(field), delta)?;
                    new.insert(field.clone(), value);
                }
            }
        }
        table.check_key_types(&new)?;

        let touched = || {
            request
                .actions
                .iter()
                .map(UpdateAction::field)
                .collect::<Vec<_>>()
        };
        let attributes = match request.return_values {
            ReturnValues::None => None,
            ReturnValues::AllNew => Some(new.clone()),
            ReturnValues::AllOld => old.clone(),
            ReturnValues::UpdatedNew => Some(pick(&new, touched())),
            ReturnValues::UpdatedOld => old.as_ref().map(|o| pick(o, touched())),
        };

        table.items.insert(key, new);
        table.refresh_item_count();

        Ok(UpdateItemOutput { attributes })
    }

    fn delete_item(&self, request: DeleteItemRequest) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::DeleteItem(request.clone()));

        let table = state.table_mut(&request.table_name)?;
        table.check_key_types(&request.key)?;
        let key = table.storage_key(&request.key)?;

        check_condition(
            &request.table_name,
            request.condition.as_ref(),
            table.items.get(&key),
        )?;

        table.items.remove(&key);
        table.refresh_item_count();

        Ok(())
    }

    fn query(&self, request: QueryRequest) -> Result<PageOutput, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::Query(request.clone()));
        if tracing::enabled!(tracing::Level::TRACE) {
            let rendered = request.render();
            tracing::trace!(
                table = %request.table_name,
                key_condition = rendered.key_condition.as_deref().unwrap_or_default(),
                filter = rendered.condition.as_deref().unwrap_or_default(),
                "memory store query"
            );
        }

        let table = state.table(&request.table_name)?;
        let index = match &request.index_name {
            Some(name) => {
                if request.consistent_read && table.is_global(name) {
                    return Err(StoreError::validation(
                        "consistent reads are not supported on global secondary indexes",
                    ));
                }
                Some(table.index(name)?)
            }
            None => None,
        };
        let key_schema = index.map_or(table.key_schema(), |i| &i.key_schema);

        let (hash_name, hash_value) = &request.key_condition.hash;
        if *hash_name != key_schema.hash {
            return Err(StoreError::validation(format!(
                "query key condition must use the hash key '{}'",
                key_schema.hash
            )));
        }
        if let Some((range_name, _)) = &request.key_condition.range
            && key_schema.range.as_deref() != Some(range_name.as_str())
        {
            return Err(StoreError::validation(format!(
                "'{range_name}' is not the range key of this table or index"
            )));
        }

        let selected = |item: &Item| {
            let hash_ok = item
                .get(hash_name)
                .and_then(|v| v.compare(hash_value))
                == Some(Ordering::Equal);
            let range_ok = match &request.key_condition.range {
                Some((name, cond)) => item.get(name).is_some_and(|v| range_matches(cond, v)),
                None => true,
            };
            hash_ok && range_ok
        };

        let page = read_page(
            table,
            index,
            selected,
            request.filter.as_ref(),
            request.limit,
            request.exclusive_start_key.as_ref(),
            request.scan_forward,
            self.page_size_bytes,
        );

        Ok(page)
    }

    fn scan(&self, request: ScanRequest) -> Result<PageOutput, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::Scan(request.clone()));

        let table = state.table(&request.table_name)?;
        let index = match &request.index_name {
            Some(name) => Some(table.index(name)?),
            None => None,
        };

        let page = read_page(
            table,
            index,
            |_| true,
            request.filter.as_ref(),
            request.limit,
            request.exclusive_start_key.as_ref(),
            true,
            self.page_size_bytes,
        );

        Ok(page)
    }

    fn batch_write_item(&self, request: BatchWriteRequest) -> Result<BatchWriteOutput, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::BatchWriteItem(request.clone()));

        if request.requests.is_empty() || request.requests.len() > MAX_BATCH_WRITE_ITEMS {
            return Err(StoreError::validation(format!(
                "batch write accepts 1 to {MAX_BATCH_WRITE_ITEMS} requests, got {}",
                request.requests.len()
            )));
        }

        let hold_back = state.unprocessed.pop_front().unwrap_or(0);
        let table = state.table_mut(&request.table_name)?;

        let mut requests = request.requests;
        let split = requests.len().saturating_sub(hold_back);
        let unprocessed = requests.split_off(split);

        for write in requests {
            match write {
                WriteRequest::Put(item) => {
                    table.check_key_types(&item)?;
                    let key = table.storage_key(&item)?;
                    table.items.insert(key, item);
                }
                WriteRequest::Delete(key_item) => {
                    let key = table.storage_key(&key_item)?;
                    table.items.remove(&key);
                }
            }
        }
        table.refresh_item_count();

        Ok(BatchWriteOutput { unprocessed })
    }
}

// ============================================================================
// Paging
// ============================================================================

// Items are evaluated in read order until the byte budget or the limit is
// reached; the filter runs after evaluation, as on the remote service.
#[expect(clippy::too_many_arguments)]
fn read_page(
    table: &MemTable,
    index: Option<&IndexDescription>,
    selected: impl Fn(&Item) -> bool,
    filter: Option<&WireCondition>,
    limit: Option<usize>,
    start: Option<&Item>,
    forward: bool,
    page_size_bytes: usize,
) -> PageOutput {
    let table_keys = table.key_schema();
    let index_keys = index.map(|i| &i.key_schema);

    let mut candidates: Vec<(Position, &Item)> = table
        .items
        .values()
        .filter(|&item| selected(item))
        .filter_map(|item| position(table_keys, index_keys, item).map(|p| (p, item)))
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    if !forward {
        candidates.reverse();
    }

    let start_at = start
        .and_then(|s| position(table_keys, index_keys, s))
        .map_or(0, |start| {
            candidates
                .iter()
                .position(|(p, _)| {
                    if forward {
                        *p > start
                    } else {
                        *p < start
                    }
                })
                .unwrap_or(candidates.len())
        });

    let mut page = PageOutput::default();
    let mut bytes = 0usize;
    let remaining = &candidates[start_at..];

    for (i, (_, item)) in remaining.iter().enumerate() {
        bytes = bytes.saturating_add(item_size(item));

        if filter.is_none_or(|f| evaluate(f, item)) {
            page.items.push(project(table, index, item));
        }

        let evaluated = i + 1;
        let full = bytes >= page_size_bytes || limit.is_some_and(|l| evaluated >= l);
        if full && evaluated < remaining.len() {
            let mut last = table.key_only(item);
            if let Some(index) = index {
                last.extend(pick(item, index.key_schema.names()));
            }
            page.last_evaluated_key = Some(last);
            break;
        }
    }

    page
}

fn project(table: &MemTable, index: Option<&IndexDescription>, item: &Item) -> Item {
    let Some(index) = index else {
        return item.clone();
    };

    let mut out = table.key_only(item);
    out.extend(pick(item, index.key_schema.names()));

    match &index.projection {
        Projection::All => item.clone(),
        Projection::KeysOnly => out,
        Projection::Include(fields) => {
            out.extend(pick(item, fields.iter().map(String::as_str)));
            out
        }
    }
}
