use super::*;
use crate::{
    db::expr::{Condition, KeyCondition, RangeCondition, UpdateAction},
    value::{AttributeValue, Item, ScalarType},
};

fn s(v: &str) -> AttributeValue {
    AttributeValue::S(v.to_string())
}

fn n(v: i64) -> AttributeValue {
    AttributeValue::N(v.to_string())
}

fn item(pairs: &[(&str, AttributeValue)]) -> Item {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn create(store: &MemoryStore) {
    store
        .create_table(CreateTableRequest {
            table_name: "peanut".into(),
            key_schema: KeySchema::new("foo", Some("bar".into())),
            attribute_definitions: vec![
                AttributeDefinition {
                    name: "foo".into(),
                    ty: ScalarType::S,
                },
                AttributeDefinition {
                    name: "bar".into(),
                    ty: ScalarType::S,
                },
                AttributeDefinition {
                    name: "child".into(),
                    ty: ScalarType::S,
                },
            ],
            billing: BillingMode::Provisioned(Throughput::new(5, 5)),
            stream: None,
            global_indexes: vec![IndexDefinition {
                name: "by-child".into(),
                key_schema: KeySchema::new("child", None),
                projection: Projection::include(["baz"]),
                throughput: Some(Throughput::new(1, 1)),
            }],
            local_indexes: Vec::new(),
        })
        .unwrap();
}

fn put(store: &MemoryStore, item: Item) {
    store
        .put_item(PutItemRequest {
            table_name: "peanut".into(),
            item,
            condition: None,
        })
        .unwrap();
}

#[test]
fn conditional_put_rejects_existing_key() {
    let store = MemoryStore::new();
    create(&store);
    put(&store, item(&[("foo", s("a")), ("bar", s("1"))]));

    let err = store
        .put_item(PutItemRequest {
            table_name: "peanut".into(),
            item: item(&[("foo", s("a")), ("bar", s("1"))]),
            condition: Some(Condition::not_exists("foo").and(Condition::not_exists("bar"))),
        })
        .unwrap_err();

    assert_eq!(
        err,
        StoreError::ConditionalCheckFailed {
            table: "peanut".into()
        }
    );
}

#[test]
fn key_type_mismatch_is_rejected() {
    let store = MemoryStore::new();
    create(&store);

    let err = store
        .put_item(PutItemRequest {
            table_name: "peanut".into(),
            item: item(&[("foo", n(1)), ("bar", s("1"))]),
            condition: None,
        })
        .unwrap_err();

    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn update_returns_only_touched_attributes() {
    let store = MemoryStore::new();
    create(&store);
    put(&store, item(&[("foo", s("a")), ("bar", s("1")), ("baz", s("x"))]));

    let out = store
        .update_item(UpdateItemRequest {
            table_name: "peanut".into(),
            key: item(&[("foo", s("a")), ("bar", s("1"))]),
            actions: vec![
                UpdateAction::set("baz", s("y")),
                UpdateAction::add("count", n(2)),
            ],
            condition: None,
            return_values: ReturnValues::UpdatedNew,
        })
        .unwrap();

    assert_eq!(
        out.attributes,
        Some(item(&[("baz", s("y")), ("count", n(2))]))
    );

    let out = store
        .update_item(UpdateItemRequest {
            table_name: "peanut".into(),
            key: item(&[("foo", s("a")), ("bar", s("1"))]),
            actions: vec![UpdateAction::add("count", n(3))],
            condition: None,
            return_values: ReturnValues::AllNew,
        })
        .unwrap();

    let all = out.attributes.unwrap();
    assert_eq!(all["count"], n(5));
    assert_eq!(all["baz"], s("y"));
}

#[test]
fn key_attributes_cannot_be_updated() {
    let store = MemoryStore::new();
    create(&store);

    let err = store
        .update_item(UpdateItemRequest {
            table_name: "peanut".into(),
            key: item(&[("foo", s("a")), ("bar", s("1"))]),
            actions: vec![UpdateAction::set("bar", s("2"))],
            condition: None,
            return_values: ReturnValues::None,
        })
        .unwrap_err();

    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn sparse_index_only_holds_items_with_its_key() {
    let store = MemoryStore::new();
    create(&store);
    put(
        &store,
        item(&[
            ("foo", s("a")),
            ("bar", s("1")),
            ("child", s("c")),
            ("baz", s("x")),
            ("extra", s("e")),
        ]),
    );
    put(&store, item(&[("foo", s("a")), ("bar", s("2")), ("baz", s("y"))]));

    let page = store
        .scan(ScanRequest {
            table_name: "peanut".into(),
            index_name: Some("by-child".into()),
            filter: None,
            limit: None,
            exclusive_start_key: None,
            consistent_read: false,
        })
        .unwrap();

    assert_eq!(page.items.len(), 1);
    let projected = &page.items[0];
    assert_eq!(projected.get("baz"), Some(&s("x")));
    assert!(!projected.contains_key("extra"));
}

#[test]
fn pages_continue_from_the_last_evaluated_key() {
    let store = MemoryStore::new().with_page_size(40);
    create(&store);
    for i in 0..10 {
        put(
            &store,
            item(&[("foo", s("a")), ("bar", s(&format!("{i:02}"))), ("pad", s("0123456789"))]),
        );
    }

    let mut request = QueryRequest {
        table_name: "peanut".into(),
        index_name: None,
        key_condition: KeyCondition {
            hash: ("foo".into(), s("a")),
            range: Some(("bar".into(), RangeCondition::Ge(s("02")))),
        },
        filter: None,
        limit: None,
        exclusive_start_key: None,
        consistent_read: false,
        scan_forward: true,
    };

    let mut seen = Vec::new();
    let mut pages = 0;
    loop {
        let page = store.query(request.clone()).unwrap();
        pages += 1;
        seen.extend(page.items.into_iter().map(|i| i["bar"].clone()));
        match page.last_evaluated_key {
            Some(key) => request.exclusive_start_key = Some(key),
            None => break,
        }
    }

    assert!(pages > 1);
    assert_eq!(seen, (2..10).map(|i| s(&format!("{i:02}"))).collect::<Vec<_>>());
}

#[test]
fn query_rejects_non_key_hash() {
    let store = MemoryStore::new();
    create(&store);

    let err = store
        .query(QueryRequest {
            table_name: "peanut".into(),
            index_name: None,
            key_condition: KeyCondition {
                hash: ("baz".into(), s("x")),
                range: None,
            },
            filter: None,
            limit: None,
            exclusive_start_key: None,
            consistent_read: false,
            scan_forward: true,
        })
        .unwrap_err();

    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn injected_unprocessed_items_are_returned() {
    let store = MemoryStore::new();
    create(&store);
    store.inject_unprocessed([2]);

    let requests = (0..5)
        .map(|i| WriteRequest::Put(item(&[("foo", s("b")), ("bar", s(&i.to_string()))])))
        .collect();
    let out = store
        .batch_write_item(BatchWriteRequest {
            table_name: "peanut".into(),
            requests,
        })
        .unwrap();

    assert_eq!(out.unprocessed.len(), 2);
    assert_eq!(store.items("peanut").len(), 3);
}

#[test]
fn enabling_a_stream_twice_fails() {
    let store = MemoryStore::new();
    create(&store);

    let mut enable = UpdateTableRequest::new("peanut");
    enable.stream = Some(StreamUpdate::Enable(StreamViewType::NewImage));

    store.update_table(enable.clone()).unwrap();
    assert!(store.update_table(enable).is_err());
}

#[test]
fn describe_reports_creating_until_polled() {
    let store = MemoryStore::new().with_creating_polls(2);
    create(&store);

    let statuses: Vec<_> = (0..3)
        .map(|_| store.describe_table("peanut").unwrap().status)
        .collect();
    assert_eq!(
        statuses,
        vec![TableStatus::Creating, TableStatus::Creating, TableStatus::Active]
    );
}

#[test]
fn rendered_update_uses_placeholders() {
    let request = UpdateItemRequest {
        table_name: "peanut".into(),
        key: item(&[("foo", s("a"))]),
        actions: vec![UpdateAction::set("baz", s("y"))],
        condition: Some(Condition::exists("foo")),
        return_values: ReturnValues::UpdatedNew,
    };

    let rendered = request.render();
    assert_eq!(rendered.update.as_deref(), Some("SET #n0 = :v0"));
    assert_eq!(rendered.condition.as_deref(), Some("attribute_exists(#n1)"));
    assert_eq!(rendered.names["#n1"], "foo");
}
