//! Model composition: a validated table, its indexes and a schema, wired
//! into one immutable shared value.

pub mod index;
mod reconcile;
pub mod table;

#[cfg(test)]
mod tests;

use crate::{
    Error,
    db::{
        Connection, batch,
        expr::{Condition, UpdateAction, WireCondition},
        query::{Query, Scan},
        record::Record,
        store::{
            DeleteItemRequest, GetItemRequest, KeySchema, ReturnValues, Throughput,
            UpdateItemRequest, WriteRequest,
        },
        tracked::TrackedValues,
    },
    model::{
        index::{IndexKind, IndexModel, IndexRef, IndexSpec},
        table::{TableModel, TableSpec},
    },
    obs::sink::{ExecKind, Span},
    schema::{SchemaAdapter, ValidationError},
    value::{AttributeValue, ConvertError, Item, Value, Values},
};
use dynamodel_config::BatchConfig;
use indexmap::IndexMap;
use std::sync::Arc;

///
/// ModelBuilder
///
/// Collects the declarative parts of a model. `build` validates them against
/// each other before any remote call is made.
///

#[derive(Clone, Debug)]
pub struct ModelBuilder {
    name: String,
    table: Option<TableSpec>,
    schema: Option<Arc<dyn SchemaAdapter>>,
    indexes: Vec<IndexSpec>,
}

impl ModelBuilder {
    #[must_use]
    pub fn table(mut self, table: TableSpec) -> Self {
        self.table = Some(table);
        self
    }

    #[must_use]
    pub fn schema(self, schema: impl SchemaAdapter + 'static) -> Self {
        self.shared_schema(Arc::new(schema))
    }

    #[must_use]
    pub fn shared_schema(mut self, schema: Arc<dyn SchemaAdapter>) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Validate the declaration and resolve its store through `conn`.
    pub fn build(self, conn: &Connection) -> Result<Model, Error> {
        let Self {
            name,
            table,
            schema,
            indexes,
        } = self;

        let spec = table.ok_or_else(|| Error::definition(&name, "missing table definition"))?;
        let schema = schema.ok_or_else(|| Error::definition(&name, "missing schema"))?;

        let owner = format!("{name}.Table");
        let table_name = spec
            .name
            .clone()
            .ok_or_else(|| Error::missing_attribute(&owner, "name"))?;
        let hash = spec
            .hash_key
            .clone()
            .ok_or_else(|| Error::missing_attribute(&owner, "hash_key"))?;

        check_key(&name, &owner, "hash_key", &hash, schema.as_ref())?;
        if let Some(range) = &spec.range_key {
            check_key(&name, &owner, "range_key", range, schema.as_ref())?;
        }
        let key_schema = KeySchema::new(hash, spec.range_key.clone());

        let mut index_models = IndexMap::new();
        for index in &indexes {
            let model = build_index(&name, &spec, &key_schema, index, schema.as_ref())?;
            if index_models.contains_key(model.name()) {
                return Err(Error::definition(
                    &name,
                    format!("duplicate index name '{}'", model.name()),
                ));
            }
            index_models.insert(model.name().to_string(), model);
        }

        let connection = conn.effective(&table_name, &spec.connection);
        let store = conn.connect(&connection)?;

        tracing::debug!(
            model = %name,
            table = %table_name,
            indexes = index_models.len(),
            "model composed"
        );

        let table = TableModel::new(
            &spec,
            table_name,
            key_schema,
            index_models,
            Arc::clone(&schema),
            store,
            connection,
            conn.settings().wait,
        );

        Ok(Model {
            inner: Arc::new(ModelInner {
                name,
                table,
                schema,
                batch: conn.settings().batch,
            }),
        })
    }
}

// A key must name a schema field of a scalar kind.
fn check_key(
    model: &str,
    owner: &str,
    attribute: &str,
    field: &str,
    schema: &dyn SchemaAdapter,
) -> Result<(), Error> {
    let declared = schema
        .field(field)
        .ok_or_else(|| Error::invalid_field(owner, attribute, field))?;

    if declared.kind().scalar_type().is_none() {
        return Err(Error::definition(
            model,
            format!(
                "{owner}.{attribute} '{field}' is a {} field and cannot be a key",
                declared.kind()
            ),
        ));
    }

    Ok(())
}

fn build_index(
    model: &str,
    table: &TableSpec,
    table_keys: &KeySchema,
    spec: &IndexSpec,
    schema: &dyn SchemaAdapter,
) -> Result<IndexModel, Error> {
    let owner = format!("{model}.{}", spec.name);

    let hash = match (spec.kind, &spec.hash_key) {
        (_, Some(hash)) => hash.clone(),
        (IndexKind::Local, None) => table_keys.hash.clone(),
        (IndexKind::Global, None) => return Err(Error::missing_attribute(&owner, "hash_key")),
    };
    let projection = spec
        .projection
        .clone()
        .ok_or_else(|| Error::missing_attribute(&owner, "projection"))?;

    check_key(model, &owner, "hash_key", &hash, schema)?;
    if let Some(range) = &spec.range_key {
        check_key(model, &owner, "range_key", range, schema)?;
    }

    let throughput = match spec.kind {
        IndexKind::Global if table.on_demand => None,
        IndexKind::Global => {
            let read = spec.read.ok_or_else(|| Error::missing_attribute(&owner, "read"))?;
            let write = spec
                .write
                .ok_or_else(|| Error::missing_attribute(&owner, "write"))?;
            Some(Throughput::new(read, write))
        }
        IndexKind::Local => {
            if hash != table_keys.hash {
                return Err(Error::definition(
                    model,
                    format!("local index '{}' must use the table hash key", spec.name),
                ));
            }
            if table_keys.range.is_none() {
                return Err(Error::definition(
                    model,
                    format!(
                        "local index '{}' requires a table with a range key",
                        spec.name
                    ),
                ));
            }
            if spec.range_key.is_none() {
                return Err(Error::missing_attribute(&owner, "range_key"));
            }
            None
        }
    };

    Ok(IndexModel::new(
        spec.name.clone(),
        spec.kind,
        KeySchema::new(hash, spec.range_key.clone()),
        projection,
        throughput,
    ))
}

///
/// UpdateOptions
///

#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    pub condition: Option<Condition>,
    pub return_values: ReturnValues,
}

///
/// Model
///
/// A composed, immutable model. Cloning is cheap and clones share the same
/// table descriptor and schema.
///

#[derive(Clone, Debug)]
pub struct Model {
    inner: Arc<ModelInner>,
}

#[derive(Debug)]
struct ModelInner {
    name: String,
    table: TableModel,
    schema: Arc<dyn SchemaAdapter>,
    batch: BatchConfig,
}

impl Model {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            table: None,
            schema: None,
            indexes: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn table(&self) -> &TableModel {
        &self.inner.table
    }

    #[must_use]
    pub fn schema(&self) -> &dyn SchemaAdapter {
        self.inner.schema.as_ref()
    }

    #[must_use]
    pub fn shared_schema(&self) -> Arc<dyn SchemaAdapter> {
        Arc::clone(&self.inner.schema)
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<IndexRef<'_>> {
        self.table().index(name).map(|index| IndexRef::new(self, index))
    }

    pub(crate) fn batch_config(&self) -> &BatchConfig {
        &self.inner.batch
    }

    // ======================================================================
    // Records
    // ======================================================================

    /// A new record, fully validated. Its first save is a full put.
    pub fn new_record(&self, values: Values) -> Result<Record, Error> {
        let values = self.schema().validate(&values, false)?;

        Ok(Record::new(self.clone(), TrackedValues::fresh(values), false))
    }

    /// A record mirroring an item known to exist, holding only some of its
    /// fields. Saves send the fields changed after construction.
    pub fn new_partial(&self, values: Values) -> Result<Record, Error> {
        let values = self.schema().validate(&values, true)?;

        Ok(Record::new(self.clone(), TrackedValues::loaded(values), true))
    }

    pub fn get(&self, key: &Values) -> Result<Option<Record>, Error> {
        self.get_with(key, false)
    }

    /// Fetch one item by primary key.
    pub fn get_with(&self, key: &Values, consistent_read: bool) -> Result<Option<Record>, Error> {
        let mut span = Span::new(ExecKind::Get, self.table().name());

        let request = GetItemRequest {
            table_name: self.table().name().to_string(),
            key: self.key_item(key)?,
            consistent_read,
        };

        let Some(item) = self.table().store().get_item(request)? else {
            return Ok(None);
        };
        span.set_rows(1);

        self.record_from_item(&item, false).map(Some)
    }

    /// Delete one item by primary key.
    pub fn delete_key(&self, key: &Values) -> Result<(), Error> {
        self.delete_item(self.key_item(key)?, None)
    }

    pub(crate) fn delete_item(
        &self,
        key: Item,
        condition: Option<&Condition>,
    ) -> Result<(), Error> {
        let mut span = Span::new(ExecKind::Delete, self.table().name());

        let request = DeleteItemRequest {
            table_name: self.table().name().to_string(),
            key,
            condition: condition.map(|c| self.wire_condition(c)).transpose()?,
        };
        self.table().store().delete_item(request)?;
        span.set_rows(1);

        Ok(())
    }

    /// Apply update actions to one item. Values of `Set` and `Add` actions
    /// are validated against their fields; key fields cannot be updated.
    pub fn update_item(
        &self,
        key: &Values,
        actions: &[UpdateAction],
        options: UpdateOptions,
    ) -> Result<Option<Values>, Error> {
        let key = self.key_item(key)?;
        self.update_wire(key, actions, options.condition.as_ref(), options.return_values)
    }

    pub(crate) fn update_wire(
        &self,
        key: Item,
        actions: &[UpdateAction],
        condition: Option<&Condition>,
        return_values: ReturnValues,
    ) -> Result<Option<Values>, Error> {
        let mut span = Span::new(ExecKind::Update, self.table().name());

        let mut err = ValidationError::new(self.schema().name());
        let mut wire = Vec::with_capacity(actions.len());
        for action in actions {
            if self.table().key_schema().names().any(|k| k == action.field()) {
                err.push(action.field(), "key fields cannot be updated");
                continue;
            }
            match action.try_map(|field, value| self.validated_wire(field, value)) {
                Ok(action) => wire.push(action),
                Err(messages) => {
                    for message in messages {
                        err.push(action.field(), message);
                    }
                }
            }
        }
        if !err.is_empty() {
            return Err(err.into());
        }

        let request = UpdateItemRequest {
            table_name: self.table().name().to_string(),
            key,
            actions: wire,
            condition: condition.map(|c| self.wire_condition(c)).transpose()?,
            return_values,
        };
        let output = self.table().store().update_item(request)?;
        span.set_rows(1);

        output
            .attributes
            .map(|item| self.from_item(&item))
            .transpose()
    }

    #[must_use]
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    #[must_use]
    pub fn scan(&self) -> Scan {
        Scan::new(self.clone())
    }

    /// Validate and write many items with batch writes. Returns the number
    /// of items written.
    pub fn put_batch(&self, items: impl IntoIterator<Item = Values>) -> Result<usize, Error> {
        let requests = items
            .into_iter()
            .map(|values| -> Result<WriteRequest, Error> {
                let values = self.schema().validate(&values, false)?;
                Ok(WriteRequest::Put(self.to_item(&values)?))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        batch::write_batch(self, requests)
    }

    /// Delete many items by primary key with batch writes.
    pub fn delete_batch(&self, keys: impl IntoIterator<Item = Values>) -> Result<usize, Error> {
        let requests = keys
            .into_iter()
            .map(|key| self.key_item(&key).map(WriteRequest::Delete))
            .collect::<Result<Vec<_>, Error>>()?;

        batch::write_batch(self, requests)
    }

    // ======================================================================
    // Wire translation
    // ======================================================================

    /// Wire form of one value: coerced through its field type when the field
    /// is declared.
    pub(crate) fn wire_value(&self, field: &str, value: &Value) -> Result<AttributeValue, Error> {
        let value = match self.schema().field(field) {
            Some(declared) => declared.field_type().check(value).map_err(|message| {
                let mut err = ValidationError::new(self.schema().name());
                err.push(field, message);
                Error::from(err)
            })?,
            None => value.clone(),
        };

        Ok(value.to_wire()?)
    }

    // Full validation of one update value, with messages kept per field.
    fn validated_wire(&self, field: &str, value: &Value) -> Result<AttributeValue, Vec<String>> {
        let declared = self
            .schema()
            .field(field)
            .ok_or_else(|| vec!["unknown field".to_string()])?;
        let value = declared.validate(value)?;

        value.to_wire().map_err(|e| vec![e.to_string()])
    }

    pub(crate) fn wire_condition(&self, condition: &Condition) -> Result<WireCondition, Error> {
        condition.try_map(&mut |field: &str, value: &Value| self.wire_value(field, value))
    }

    /// Primary key item from native key values.
    pub(crate) fn key_item(&self, key: &Values) -> Result<Item, Error> {
        let mut err = ValidationError::new(self.schema().name());
        let mut item = Item::new();

        for name in self.table().key_schema().names() {
            match key.get(name).filter(|v| !v.is_null()) {
                Some(value) => {
                    item.insert(name.to_string(), self.wire_value(name, value)?);
                }
                None => err.push(name, "missing key field"),
            }
        }

        if err.is_empty() { Ok(item) } else { Err(err.into()) }
    }

    /// Wire item from normalized values.
    pub(crate) fn to_item(&self, values: &Values) -> Result<Item, Error> {
        values
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| Ok((k.clone(), v.to_wire()?)))
            .collect::<Result<Item, ConvertError>>()
            .map_err(Error::from)
    }

    /// Native values from a stored item. Attributes the schema does not
    /// declare are dropped.
    pub(crate) fn from_item(&self, item: &Item) -> Result<Values, Error> {
        let mut values = Values::new();

        for (name, av) in item {
            let Some(field) = self.schema().field(name) else {
                tracing::debug!(
                    model = %self.name(),
                    attribute = %name,
                    "dropping undeclared attribute"
                );
                continue;
            };

            let value = Value::from_wire(name, av, Some(field.kind()))?;
            if !value.is_null() {
                values.insert(name.clone(), value);
            }
        }

        Ok(values)
    }

    pub(crate) fn record_from_item(&self, item: &Item, partial: bool) -> Result<Record, Error> {
        let values = self.from_item(item)?;

        Ok(Record::new(self.clone(), TrackedValues::loaded(values), partial))
    }
}
