use super::*;
use crate::{
    db::store::{
        BillingMode, IndexUpdate, MemoryStore, Projection, SharedStoreConnector, Store,
        StoreError, StreamUpdate, StreamViewType, TableStatus,
    },
    error::ErrorClass,
    schema::{Field, Schema},
    value::ScalarType,
};
use dynamodel_config::{Settings, WaitConfig};
use proptest::prelude::*;

fn schema() -> Schema {
    Schema::builder("Peanut")
        .field("foo", Field::text().required())
        .field("bar", Field::text().required())
        .field("baz", Field::text())
        .field("count", Field::int())
        .field("child", Field::map())
        .build()
}

fn table() -> TableSpec {
    TableSpec::new("peanut")
        .hash_key("foo")
        .range_key("bar")
        .read(5)
        .write(5)
}

fn fast_settings(max_attempts: u32) -> Settings {
    Settings {
        wait: WaitConfig {
            interval_ms: 1,
            max_attempts,
        },
        ..Settings::default()
    }
}

fn shared(store: &Arc<MemoryStore>, settings: Settings) -> Connection {
    let store: Arc<dyn Store> = Arc::clone(store) as Arc<dyn Store>;
    Connection::new(Arc::new(SharedStoreConnector::new(store)), settings)
}

fn build(builder: ModelBuilder) -> Result<Model, Error> {
    let (conn, _) = Connection::memory(Settings::default());
    builder.build(&conn)
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn missing_table_or_schema_is_a_definition_error() {
    let err = build(Model::builder("Peanut").schema(schema())).unwrap_err();
    assert!(matches!(err, Error::Definition { .. }));

    let err = build(Model::builder("Peanut").table(table())).unwrap_err();
    assert!(matches!(err, Error::Definition { .. }));
    assert_eq!(err.class(), ErrorClass::Definition);
}

#[test]
fn missing_hash_key_is_reported() {
    let err = build(
        Model::builder("Peanut")
            .table(TableSpec::new("peanut").read(1).write(1))
            .schema(schema()),
    )
    .unwrap_err();

    match err {
        Error::MissingTableAttribute { owner, attribute } => {
            assert_eq!(owner, "Peanut.Table");
            assert_eq!(attribute, "hash_key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unknown_key_field_is_invalid_schema_field() {
    let err = build(
        Model::builder("Peanut")
            .table(table().range_key("nope"))
            .schema(schema()),
    )
    .unwrap_err();

    match err {
        Error::InvalidSchemaField { attribute, field, .. } => {
            assert_eq!(attribute, "range_key");
            assert_eq!(field, "nope");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn structured_fields_cannot_be_keys() {
    let err = build(
        Model::builder("Peanut")
            .table(TableSpec::new("peanut").hash_key("child"))
            .schema(schema()),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Definition { .. }));
}

#[test]
fn global_index_requires_projection_and_capacity() {
    let err = build(
        Model::builder("Peanut")
            .table(table())
            .schema(schema())
            .index(IndexSpec::global("by-baz").hash_key("baz").read(1).write(1)),
    )
    .unwrap_err();
    assert!(
        matches!(&err, Error::MissingTableAttribute { attribute, .. } if attribute == "projection")
    );

    let err = build(
        Model::builder("Peanut")
            .table(table())
            .schema(schema())
            .index(
                IndexSpec::global("by-baz")
                    .hash_key("baz")
                    .projection(Projection::KeysOnly)
                    .read(1),
            ),
    )
    .unwrap_err();
    assert!(matches!(&err, Error::MissingTableAttribute { attribute, .. } if attribute == "write"));
}

#[test]
fn on_demand_global_index_needs_no_capacity() {
    let model = build(
        Model::builder("Peanut")
            .table(TableSpec::new("peanut").hash_key("foo").on_demand())
            .schema(schema())
            .index(
                IndexSpec::global("by-baz")
                    .hash_key("baz")
                    .projection(Projection::All),
            ),
    )
    .unwrap();

    assert_eq!(model.table().index("by-baz").unwrap().throughput(), None);
    assert_eq!(model.table().billing().unwrap(), BillingMode::PayPerRequest);
}

#[test]
fn local_index_must_share_the_table_hash_key() {
    let err = build(
        Model::builder("Peanut")
            .table(table())
            .schema(schema())
            .index(
                IndexSpec::local("by-baz")
                    .hash_key("baz")
                    .range_key("count")
                    .projection(Projection::All),
            ),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Definition { .. }));

    let model = build(
        Model::builder("Peanut")
            .table(table())
            .schema(schema())
            .index(
                IndexSpec::local("by-count")
                    .range_key("count")
                    .projection(Projection::All),
            ),
    )
    .unwrap();
    let index = model.table().index("by-count").unwrap();
    assert_eq!(index.key_schema().hash, "foo");
    assert_eq!(index.throughput(), None);
}

#[test]
fn local_index_needs_a_table_range_key() {
    let err = build(
        Model::builder("Peanut")
            .table(TableSpec::new("peanut").hash_key("foo").read(1).write(1))
            .schema(schema())
            .index(
                IndexSpec::local("by-count")
                    .range_key("count")
                    .projection(Projection::All),
            ),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Definition { .. }));
}

#[test]
fn duplicate_index_names_are_rejected() {
    let index = IndexSpec::global("by-baz")
        .hash_key("baz")
        .projection(Projection::KeysOnly)
        .read(1)
        .write(1);

    let err = build(
        Model::builder("Peanut")
            .table(table())
            .schema(schema())
            .index(index.clone())
            .index(index),
    )
    .unwrap_err();

    assert!(err.to_string().contains("duplicate index name 'by-baz'"));
}

#[test]
fn index_ref_reaches_table_and_schema() {
    let model = build(
        Model::builder("Peanut")
            .table(table())
            .schema(schema())
            .index(
                IndexSpec::global("by-baz")
                    .hash_key("baz")
                    .projection(Projection::All)
                    .read(1)
                    .write(1),
            ),
    )
    .unwrap();

    let index = model.index("by-baz").unwrap();
    assert_eq!(index.table().name(), "peanut");
    assert_eq!(index.schema().name(), "Peanut");
    assert!(index.index().projects_all());
    assert!(model.index("missing").is_none());
}

// ============================================================================
// Table descriptor
// ============================================================================

#[test]
fn attribute_definitions_cover_every_key_once() {
    let model = build(
        Model::builder("Peanut")
            .table(table())
            .schema(schema())
            .index(
                IndexSpec::global("by-count")
                    .hash_key("count")
                    .range_key("foo")
                    .projection(Projection::KeysOnly)
                    .read(1)
                    .write(1),
            ),
    )
    .unwrap();

    let defs: Vec<(String, ScalarType)> = model
        .table()
        .attribute_definitions()
        .into_iter()
        .map(|d| (d.name, d.ty))
        .collect();

    assert_eq!(
        defs,
        vec![
            ("foo".to_string(), ScalarType::S),
            ("bar".to_string(), ScalarType::S),
            ("count".to_string(), ScalarType::N),
        ]
    );
}

#[test]
fn provisioned_table_needs_both_capacities_at_create() {
    let model = build(
        Model::builder("Peanut")
            .table(TableSpec::new("peanut").hash_key("foo").read(5))
            .schema(schema()),
    )
    .unwrap();

    let err = model.table().create_table().unwrap_err();
    assert!(matches!(&err, Error::MissingTableAttribute { attribute, .. } if attribute == "write"));
    assert!(!model.table().exists().unwrap());
}

#[test]
fn create_waits_until_active() {
    let store = Arc::new(MemoryStore::new().with_creating_polls(2));
    let conn = shared(&store, fast_settings(3));
    let model = Model::builder("Peanut")
        .table(table())
        .schema(schema())
        .build(&conn)
        .unwrap();

    assert!(!model.table().exists().unwrap());
    let description = model.table().create_table().unwrap();

    assert_eq!(description.status, TableStatus::Active);
    assert!(model.table().was_created());
    assert!(model.table().exists().unwrap());
}

#[test]
fn create_gives_up_after_configured_attempts() {
    let store = Arc::new(MemoryStore::new().with_creating_polls(5));
    let conn = shared(&store, fast_settings(2));
    let model = Model::builder("Peanut")
        .table(table())
        .schema(schema())
        .build(&conn)
        .unwrap();

    let err = model.table().create_table().unwrap_err();
    assert!(matches!(err, Error::TableNotActive { attempts: 2, .. }));
    assert_eq!(err.class(), ErrorClass::Store);
}

#[test]
fn delete_removes_the_table() {
    let model = build(Model::builder("Peanut").table(table()).schema(schema())).unwrap();
    model.table().create_table().unwrap();

    model.table().delete().unwrap();
    assert!(!model.table().exists().unwrap());

    let err = model.table().delete().unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::ResourceNotFound(_))));
}

// ============================================================================
// Reconciliation
// ============================================================================

fn by_baz(projection: Projection, read: u64) -> IndexSpec {
    IndexSpec::global("by-baz")
        .hash_key("baz")
        .projection(projection)
        .read(read)
        .write(1)
}

fn model_on(conn: &Connection, table: TableSpec, indexes: Vec<IndexSpec>) -> Model {
    indexes
        .into_iter()
        .fold(Model::builder("Peanut").table(table).schema(schema()), |b, i| b.index(i))
        .build(conn)
        .unwrap()
}

#[test]
fn unchanged_table_needs_no_updates() {
    let store = Arc::new(MemoryStore::new());
    let conn = shared(&store, fast_settings(3));
    let model = model_on(&conn, table(), vec![by_baz(Projection::All, 1)]);
    model.table().create_table().unwrap();

    assert_eq!(model.table().update_table().unwrap(), 0);
    assert!(store.update_table_calls().is_empty());
}

#[test]
fn index_projection_change_is_drop_and_create() {
    let store = Arc::new(MemoryStore::new());
    let conn = shared(&store, fast_settings(3));
    model_on(&conn, table(), vec![by_baz(Projection::All, 1)])
        .table()
        .create_table()
        .unwrap();

    let changed = model_on(&conn, table(), vec![by_baz(Projection::KeysOnly, 1)]);
    assert_eq!(changed.table().update_table().unwrap(), 2);

    let calls = store.update_table_calls();
    assert!(matches!(
        calls[0].index_update,
        Some(IndexUpdate::Delete { ref name }) if name == "by-baz"
    ));
    assert!(matches!(calls[1].index_update, Some(IndexUpdate::Create(_))));
    assert_eq!(calls[1].attribute_definitions.len(), 1);

    let live = changed.table().describe().unwrap();
    assert_eq!(live.global_indexes[0].projection, Projection::KeysOnly);
}

#[test]
fn index_throughput_change_is_one_in_place_update() {
    let store = Arc::new(MemoryStore::new());
    let conn = shared(&store, fast_settings(3));
    model_on(&conn, table(), vec![by_baz(Projection::All, 1)])
        .table()
        .create_table()
        .unwrap();

    let changed = model_on(&conn, table(), vec![by_baz(Projection::All, 7)]);
    assert_eq!(changed.table().update_table().unwrap(), 1);

    let calls = store.update_table_calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(
        calls[0].index_update,
        Some(IndexUpdate::Update { throughput, .. }) if throughput == Throughput::new(7, 1)
    ));
}

#[test]
fn stream_view_change_counts_once() {
    let store = Arc::new(MemoryStore::new());
    let conn = shared(&store, fast_settings(3));
    model_on(&conn, table().stream(StreamViewType::NewImage), vec![])
        .table()
        .create_table()
        .unwrap();

    let changed = model_on(&conn, table().stream(StreamViewType::KeysOnly), vec![]);
    assert_eq!(changed.table().update_table().unwrap(), 1);

    let streams: Vec<_> = store
        .update_table_calls()
        .into_iter()
        .filter_map(|c| c.stream)
        .collect();
    assert_eq!(
        streams,
        vec![
            StreamUpdate::Disable,
            StreamUpdate::Enable(StreamViewType::KeysOnly)
        ]
    );
}

#[test]
fn switching_to_on_demand_is_a_billing_change() {
    let store = Arc::new(MemoryStore::new());
    let conn = shared(&store, fast_settings(3));
    model_on(&conn, table(), vec![]).table().create_table().unwrap();

    let changed = model_on(
        &conn,
        TableSpec::new("peanut")
            .hash_key("foo")
            .range_key("bar")
            .on_demand(),
        vec![],
    );
    assert_eq!(changed.table().update_table().unwrap(), 1);
    assert_eq!(
        changed.table().describe().unwrap().billing,
        BillingMode::PayPerRequest
    );
}

#[test]
fn local_index_drift_is_not_applied() {
    let store = Arc::new(MemoryStore::new());
    let conn = shared(&store, fast_settings(3));
    model_on(&conn, table(), vec![]).table().create_table().unwrap();

    let changed = model_on(
        &conn,
        table(),
        vec![
            IndexSpec::local("by-count")
                .range_key("count")
                .projection(Projection::All),
        ],
    );
    assert_eq!(changed.table().update_table().unwrap(), 0);
}

proptest! {
    #[test]
    fn attribute_definitions_are_unique_and_keys_first(
        picks in proptest::collection::vec((0usize..4, proptest::option::of(0usize..4)), 0..6)
    ) {
        let keyable = ["foo", "bar", "baz", "count"];
        let mut builder = Model::builder("Peanut").table(table()).schema(schema());
        for (i, (hash, range)) in picks.iter().enumerate() {
            let mut index = IndexSpec::global(format!("idx{i}"))
                .hash_key(keyable[*hash])
                .projection(Projection::KeysOnly)
                .read(1)
                .write(1);
            if let Some(range) = range {
                index = index.range_key(keyable[*range]);
            }
            builder = builder.index(index);
        }
        let model = build(builder).unwrap();

        let names: Vec<String> = model
            .table()
            .attribute_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();

        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), names.len());
        prop_assert_eq!(&names[..2], &["foo".to_string(), "bar".to_string()]);
    }
}
