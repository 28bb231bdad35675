#![allow(dead_code)]

use dynamodel::{
    config::{BatchConfig, WaitConfig},
    db::store::{MemoryConnector, MemoryStore},
    prelude::*,
    schema::validator::Lte,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Settings with short waits and retries.
pub fn settings() -> Settings {
    Settings {
        wait: WaitConfig {
            interval_ms: 1,
            max_attempts: 5,
        },
        batch: BatchConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        ..Settings::default()
    }
}

pub fn connection() -> (Connection, Arc<MemoryConnector>) {
    init_tracing();
    Connection::memory(settings())
}

pub fn test_schema() -> Schema {
    Schema::builder("TestModel")
        .field("foo", Field::text().required())
        .field("bar", Field::text().required())
        .field("baz", Field::text().required())
        .field("count", Field::int().validator(Lte::new(100)))
        .field("child", Field::map())
        .field("things", Field::list())
        .field("sparse", Field::text())
        .build()
}

pub fn test_table() -> TableSpec {
    TableSpec::new("peanut-butter")
        .hash_key("foo")
        .range_key("bar")
        .read(5)
        .write(5)
}

/// Composed and created test model, plus the store behind it.
pub fn test_model(conn: &Connection, connector: &MemoryConnector) -> (Model, Arc<MemoryStore>) {
    let model = Model::builder("TestModel")
        .table(test_table())
        .schema(test_schema())
        .build(conn)
        .unwrap();
    model.table().create_table().unwrap();

    let store = connector.store_for(model.table().connection());
    (model, store)
}

pub fn key(foo: &str, bar: &str) -> Values {
    values([("foo", foo), ("bar", bar)])
}

pub fn item(foo: &str, bar: &str, baz: &str) -> Values {
    values([("foo", foo), ("bar", bar), ("baz", baz)])
}
