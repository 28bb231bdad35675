use crate::{
    Error,
    db::store::{
        AttributeDefinition, BillingMode, CreateTableRequest, KeySchema, SharedStore, StoreError,
        TableDescription, TableStatus, Throughput,
    },
    model::{
        index::{IndexKind, IndexModel},
        reconcile,
    },
    obs::sink::{ExecKind, Span},
    schema::SchemaAdapter,
};
use dynamodel_config::{ConnectionConfig, WaitConfig};
use indexmap::IndexMap;
use std::{
    collections::BTreeSet,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

// re-exports
pub use crate::db::store::StreamViewType;

///
/// TableSpec
///
/// Declarative table definition. Throughput is either provisioned (`read`
/// and `write`, checked when the table is created or updated) or explicitly
/// on demand.
///

#[derive(Clone, Debug, Default)]
pub struct TableSpec {
    pub(crate) name: Option<String>,
    pub(crate) hash_key: Option<String>,
    pub(crate) range_key: Option<String>,
    pub(crate) read: Option<u64>,
    pub(crate) write: Option<u64>,
    pub(crate) on_demand: bool,
    pub(crate) stream: Option<StreamViewType>,
    pub(crate) connection: ConnectionConfig,
}

impl TableSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::default().name(name)
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn hash_key(mut self, field: impl Into<String>) -> Self {
        self.hash_key = Some(field.into());
        self
    }

    #[must_use]
    pub fn range_key(mut self, field: impl Into<String>) -> Self {
        self.range_key = Some(field.into());
        self
    }

    #[must_use]
    pub const fn read(mut self, units: u64) -> Self {
        self.read = Some(units);
        self
    }

    #[must_use]
    pub const fn write(mut self, units: u64) -> Self {
        self.write = Some(units);
        self
    }

    /// Pay-per-request billing; takes no read/write capacity.
    #[must_use]
    pub const fn on_demand(mut self) -> Self {
        self.on_demand = true;
        self
    }

    #[must_use]
    pub const fn stream(mut self, view: StreamViewType) -> Self {
        self.stream = Some(view);
        self
    }

    /// Per-table connection overrides, merged over configured defaults.
    #[must_use]
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }
}

///
/// TableModel
///
/// Validated table descriptor bound to a store handle. The in-memory value
/// only records that creation happened; the remote definition is the source
/// of truth for everything else.
///

pub struct TableModel {
    name: String,
    key_schema: KeySchema,
    read: Option<u64>,
    write: Option<u64>,
    on_demand: bool,
    stream: Option<StreamViewType>,
    indexes: IndexMap<String, IndexModel>,
    schema: Arc<dyn SchemaAdapter>,
    store: SharedStore,
    connection: ConnectionConfig,
    wait: WaitConfig,
    created: AtomicBool,
}

impl TableModel {
    #[expect(clippy::too_many_arguments)]
    pub(crate) fn new(
        spec: &TableSpec,
        name: String,
        key_schema: KeySchema,
        indexes: IndexMap<String, IndexModel>,
        schema: Arc<dyn SchemaAdapter>,
        store: SharedStore,
        connection: ConnectionConfig,
        wait: WaitConfig,
    ) -> Self {
        Self {
            name,
            key_schema,
            read: spec.read,
            write: spec.write,
            on_demand: spec.on_demand,
            stream: spec.stream,
            indexes,
            schema,
            store,
            connection,
            wait,
            created: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn hash_key(&self) -> &str {
        &self.key_schema.hash
    }

    #[must_use]
    pub fn range_key(&self) -> Option<&str> {
        self.key_schema.range.as_deref()
    }

    #[must_use]
    pub const fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    #[must_use]
    pub const fn read(&self) -> Option<u64> {
        self.read
    }

    #[must_use]
    pub const fn write(&self) -> Option<u64> {
        self.write
    }

    #[must_use]
    pub const fn stream(&self) -> Option<StreamViewType> {
        self.stream
    }

    #[must_use]
    pub const fn is_on_demand(&self) -> bool {
        self.on_demand
    }

    /// Indexes in declaration order.
    #[must_use]
    pub const fn indexes(&self) -> &IndexMap<String, IndexModel> {
        &self.indexes
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexModel> {
        self.indexes.get(name)
    }

    pub(crate) fn global_indexes(&self) -> impl Iterator<Item = &IndexModel> {
        self.indexes
            .values()
            .filter(|i| i.kind() == IndexKind::Global)
    }

    pub(crate) fn local_indexes(&self) -> impl Iterator<Item = &IndexModel> {
        self.indexes.values().filter(|i| i.kind() == IndexKind::Local)
    }

    #[must_use]
    pub const fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Whether this descriptor created its table.
    #[must_use]
    pub fn was_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    /// Key attribute definitions: hash, range, then every index key in
    /// declaration order, each name once.
    #[must_use]
    pub fn attribute_definitions(&self) -> Vec<AttributeDefinition> {
        let index_keys = self.indexes.values().flat_map(|i| i.key_schema().names());
        let names = self.key_schema.names().chain(index_keys);

        let mut seen = BTreeSet::new();
        names
            .filter(|name| seen.insert(*name))
            .filter_map(|name| {
                let ty = self.schema.field(name)?.kind().scalar_type()?;
                Some(AttributeDefinition {
                    name: name.to_string(),
                    ty,
                })
            })
            .collect()
    }

    /// Billing mode, failing when provisioned capacity is incomplete.
    pub fn billing(&self) -> Result<BillingMode, Error> {
        if self.on_demand {
            return Ok(BillingMode::PayPerRequest);
        }

        let owner = format!("{}.Table", self.name);
        let read = self.read.ok_or_else(|| Error::missing_attribute(&owner, "read"))?;
        let write = self.write.ok_or_else(|| Error::missing_attribute(&owner, "write"))?;

        Ok(BillingMode::Provisioned(Throughput::new(read, write)))
    }

    /// Create the remote table and block until it is active.
    pub fn create_table(&self) -> Result<TableDescription, Error> {
        let billing = self.billing()?;
        let _span = Span::new(ExecKind::Admin, &self.name);

        let request = CreateTableRequest {
            table_name: self.name.clone(),
            key_schema: self.key_schema.clone(),
            attribute_definitions: self.attribute_definitions(),
            billing,
            stream: self.stream,
            global_indexes: self.global_indexes().map(IndexModel::definition).collect(),
            local_indexes: self.local_indexes().map(IndexModel::definition).collect(),
        };

        tracing::info!(
            table = %self.name,
            indexes = self.indexes.len(),
            "creating table"
        );
        self.store.create_table(request)?;
        self.created.store(true, Ordering::Release);

        self.wait_until_active()
    }

    pub fn describe(&self) -> Result<TableDescription, Error> {
        Ok(self.store.describe_table(&self.name)?)
    }

    /// Whether the remote table exists.
    pub fn exists(&self) -> Result<bool, Error> {
        match self.store.describe_table(&self.name) {
            Ok(_) => Ok(true),
            Err(StoreError::ResourceNotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Poll until the table reports ACTIVE, within the configured attempts.
    pub fn wait_until_active(&self) -> Result<TableDescription, Error> {
        for attempt in 1..=self.wait.max_attempts {
            let description = self.describe()?;
            if description.status == TableStatus::Active {
                return Ok(description);
            }

            tracing::debug!(
                table = %self.name,
                status = %description.status,
                attempt,
                "waiting for table to become active"
            );
            if attempt < self.wait.max_attempts {
                thread::sleep(self.wait.interval());
            }
        }

        Err(Error::TableNotActive {
            table: self.name.clone(),
            attempts: self.wait.max_attempts,
        })
    }

    /// Bring the remote table in line with this descriptor. Returns the
    /// number of changes applied; 0 when nothing differs.
    pub fn update_table(&self) -> Result<usize, Error> {
        let _span = Span::new(ExecKind::Admin, &self.name);

        reconcile::reconcile(self)
    }

    /// Delete the remote table.
    pub fn delete(&self) -> Result<(), Error> {
        let _span = Span::new(ExecKind::Admin, &self.name);

        tracing::info!(table = %self.name, "deleting table");
        self.store.delete_table(&self.name)?;
        self.created.store(false, Ordering::Release);

        Ok(())
    }
}

impl fmt::Debug for TableModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableModel")
            .field("name", &self.name)
            .field("key_schema", &self.key_schema)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("on_demand", &self.on_demand)
            .field("stream", &self.stream)
            .field("indexes", &self.indexes.keys().collect::<Vec<_>>())
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
