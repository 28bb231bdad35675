use crate::{
    db::{
        query::{Query, Scan},
        store::{IndexDefinition, KeySchema, Throughput},
    },
    model::{Model, table::TableModel},
    schema::SchemaAdapter,
};
use derive_more::Display;

// re-exports
pub use crate::db::store::Projection;

///
/// IndexKind
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum IndexKind {
    #[display("global")]
    Global,
    #[display("local")]
    Local,
}

///
/// IndexSpec
///
/// Declarative secondary index. Local indexes share the table's hash key
/// and throughput.
///

#[derive(Clone, Debug)]
pub struct IndexSpec {
    pub(crate) name: String,
    pub(crate) kind: IndexKind,
    pub(crate) hash_key: Option<String>,
    pub(crate) range_key: Option<String>,
    pub(crate) projection: Option<Projection>,
    pub(crate) read: Option<u64>,
    pub(crate) write: Option<u64>,
}

impl IndexSpec {
    fn new(name: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            name: name.into(),
            kind,
            hash_key: None,
            range_key: None,
            projection: None,
            read: None,
            write: None,
        }
    }

    #[must_use]
    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Global)
    }

    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Local)
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
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
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

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

///
/// IndexModel
/// Validated, immutable index descriptor owned by its table.
///

#[derive(Clone, Debug, PartialEq)]
pub struct IndexModel {
    name: String,
    kind: IndexKind,
    key_schema: KeySchema,
    projection: Projection,
    throughput: Option<Throughput>,
}

impl IndexModel {
    pub(crate) const fn new(
        name: String,
        kind: IndexKind,
        key_schema: KeySchema,
        projection: Projection,
        throughput: Option<Throughput>,
    ) -> Self {
        Self {
            name,
            kind,
            key_schema,
            projection,
            throughput,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> IndexKind {
        self.kind
    }

    #[must_use]
    pub const fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    #[must_use]
    pub const fn projection(&self) -> &Projection {
        &self.projection
    }

    #[must_use]
    pub const fn throughput(&self) -> Option<Throughput> {
        self.throughput
    }

    /// Whether reads through this index return whole items.
    #[must_use]
    pub const fn projects_all(&self) -> bool {
        matches!(self.projection, Projection::All)
    }

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
/// IndexRef
/// An index seen through its model, for back-references and queries.
///

#[derive(Clone, Copy, Debug)]
pub struct IndexRef<'a> {
    model: &'a Model,
    index: &'a IndexModel,
}

impl<'a> IndexRef<'a> {
    pub(crate) const fn new(model: &'a Model, index: &'a IndexModel) -> Self {
        Self { model, index }
    }

    #[must_use]
    pub const fn index(&self) -> &'a IndexModel {
        self.index
    }

    #[must_use]
    pub fn table(&self) -> &'a TableModel {
        self.model.table()
    }

    #[must_use]
    pub fn schema(&self) -> &'a dyn SchemaAdapter {
        self.model.schema()
    }

    /// Query builder against this index.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::on_index(self.model.clone(), self.index.name())
    }

    /// Scan builder over this index.
    #[must_use]
    pub fn scan(&self) -> Scan {
        Scan::on_index(self.model.clone(), self.index.name())
    }
}
