mod common;

use common::{connection, item, key, test_model};
use dynamodel::{
    ErrorKind,
    db::store::ReturnValues,
    obs::{metrics_report, metrics_reset_all},
    prelude::*,
    value::{AttributeValue, Item},
};
use uuid::Uuid;

fn s(v: &str) -> AttributeValue {
    AttributeValue::S(v.to_string())
}

#[test]
fn full_save_then_get_round_trips_values() {
    let (conn, connector) = connection();
    let (model, store) = test_model(&conn, &connector);

    let mut record = model
        .new_record(values([
            ("foo", Value::from("first")),
            ("bar", Value::from("one")),
            ("baz", Value::from("hello")),
            ("count", Value::from(3)),
            ("things", Value::List(vec!["a".into(), "b".into()])),
        ]))
        .unwrap();
    record.save().unwrap();

    assert_eq!(store.items("peanut-butter").len(), 1);

    let loaded = model.get(&key("first", "one")).unwrap().unwrap();
    assert_eq!(loaded.get("count"), Some(&Value::Int(3)));
    assert_eq!(loaded.values(), record.values());
    assert!(!loaded.has_changes());

    assert!(model.get(&key("first", "two")).unwrap().is_none());
}

#[test]
fn partial_save_sends_only_changed_fields() {
    let (conn, connector) = connection();
    let (model, store) = test_model(&conn, &connector);

    let mut record = model.new_record(item("first", "one", "hello")).unwrap();
    record.save().unwrap();
    store.clear_calls();

    // nothing changed
    record.save_with(SaveOptions::default().partial()).unwrap();
    assert!(store.update_item_calls().is_empty());

    record.set("baz", "changed");
    assert!(record.is_dirty("baz"));
    record.save_with(SaveOptions::default().partial()).unwrap();

    let calls = store.update_item_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].key,
        [("bar".to_string(), s("one")), ("foo".to_string(), s("first"))]
            .into_iter()
            .collect::<Item>()
    );
    assert_eq!(
        calls[0].actions,
        vec![UpdateAction::Set("baz".into(), s("changed"))]
    );
    assert_eq!(calls[0].return_values, ReturnValues::UpdatedNew);
    assert!(!record.has_changes());

    record.set("count", 7);
    record.save_with(SaveOptions::default().partial()).unwrap();

    let calls = store.update_item_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].actions,
        vec![UpdateAction::Set("count".into(), AttributeValue::N("7".into()))]
    );

    let loaded = model.get(&key("first", "one")).unwrap().unwrap();
    assert_eq!(loaded.get("baz"), Some(&Value::from("changed")));
    assert_eq!(loaded.get("count"), Some(&Value::Int(7)));
}

#[test]
fn unset_field_is_removed_by_partial_save() {
    let (conn, connector) = connection();
    let (model, store) = test_model(&conn, &connector);

    let mut values = item("first", "one", "hello");
    values.insert("count".into(), Value::from(2));
    let mut record = model.new_record(values).unwrap();
    record.save().unwrap();

    record.unset("count");
    record.save_with(SaveOptions::default().partial()).unwrap();

    let calls = store.update_item_calls();
    assert_eq!(calls[0].actions, vec![UpdateAction::Remove("count".into())]);

    let loaded = model.get(&key("first", "one")).unwrap().unwrap();
    assert_eq!(loaded.get("count"), None);
}

#[test]
fn partial_save_rejects_changed_key_fields() {
    let (conn, connector) = connection();
    let (model, store) = test_model(&conn, &connector);

    model
        .new_record(item("first", "one", "hello"))
        .unwrap()
        .save()
        .unwrap();
    let mut record = model.get(&key("first", "one")).unwrap().unwrap();
    store.clear_calls();

    record.set("foo", "moved");
    let err: Error = record
        .save_with(SaveOptions::default().partial())
        .unwrap_err()
        .into();
    let ErrorKind::Validation { fields } = err.kind else {
        panic!("expected validation error");
    };
    assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["foo"]);
    assert!(record.is_dirty("foo"));

    record.set("baz", "changed");
    assert!(record.save_with(SaveOptions::default().partial()).is_err());

    assert!(store.calls().is_empty());
    let stored = store.items("peanut-butter");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["foo"], s("first"));
    assert_eq!(stored[0]["baz"], s("hello"));
}

#[test]
fn index_loaded_record_saves_only_its_changes() {
    let (conn, connector) = connection();
    let model = Model::builder("TestModel")
        .table(common::test_table())
        .schema(common::test_schema())
        .index(
            IndexSpec::global("by-sparse")
                .hash_key("sparse")
                .projection(Projection::KeysOnly)
                .read(5)
                .write(5),
        )
        .build(&conn)
        .unwrap();
    model.table().create_table().unwrap();
    let store = connector.store_for(model.table().connection());

    let mut values = item("first", "one", "hello");
    values.insert("count".into(), Value::from(42));
    values.insert("sparse".into(), Value::from("hit"));
    model.new_record(values).unwrap().save().unwrap();

    let index = model.index("by-sparse").unwrap();
    let mut found = index.query().eq("sparse", "hit").all().unwrap();
    let mut record = found.remove(0);
    assert!(record.is_partial());
    assert_eq!(record.get("baz"), None);
    store.clear_calls();

    record.set("baz", "changed");
    record.save().unwrap();

    let calls = store.update_item_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].actions,
        vec![UpdateAction::Set("baz".into(), s("changed"))]
    );
    assert_eq!(store.calls().len(), 1);

    let loaded = model.get(&key("first", "one")).unwrap().unwrap();
    assert_eq!(loaded.get("count"), Some(&Value::Int(42)));
    assert_eq!(loaded.get("sparse"), Some(&Value::from("hit")));
    assert_eq!(loaded.get("baz"), Some(&Value::from("changed")));
}

#[test]
fn return_all_merges_every_stored_attribute() {
    let (conn, connector) = connection();
    let (model, _) = test_model(&conn, &connector);

    let mut values = item("first", "one", "hello");
    values.insert("count".into(), Value::from(3));
    model.new_record(values).unwrap().save().unwrap();

    let mut narrow = model.new_partial(key("first", "one")).unwrap();
    narrow.set("baz", "updated");
    narrow.save_with(SaveOptions::default().partial()).unwrap();
    assert_eq!(narrow.get("count"), None);

    let mut wide = model.new_partial(key("first", "one")).unwrap();
    wide.set("baz", "again");
    wide.save_with(SaveOptions::default().partial().return_all()).unwrap();
    assert_eq!(wide.get("count"), Some(&Value::Int(3)));
    assert_eq!(wide.get("baz"), Some(&Value::from("again")));
}

#[test]
fn unique_save_rejects_existing_key() {
    metrics_reset_all();
    let (conn, connector) = connection();
    let (model, _) = test_model(&conn, &connector);

    model
        .new_record(item("first", "one", "hello"))
        .unwrap()
        .save_with(SaveOptions::default().unique())
        .unwrap();

    let mut duplicate = model.new_record(item("first", "one", "other")).unwrap();
    let err: Error = duplicate
        .save_with(SaveOptions::default().unique())
        .unwrap_err()
        .into();
    assert_eq!(err.kind, ErrorKind::HashKeyExists);

    let counters = metrics_report().counters.unwrap();
    assert_eq!(counters.ops.conditional_conflicts, 1);

    duplicate.save().unwrap();
    let loaded = model.get(&key("first", "one")).unwrap().unwrap();
    assert_eq!(loaded.get("baz"), Some(&Value::from("other")));
}

#[test]
fn save_condition_failure_is_a_store_error() {
    let (conn, connector) = connection();
    let (model, _) = test_model(&conn, &connector);

    let mut record = model.new_record(item("first", "one", "hello")).unwrap();
    record.save().unwrap();

    let err: Error = record
        .save_with(SaveOptions::default().condition(Condition::eq("baz", "nope")))
        .unwrap_err()
        .into();

    assert_eq!(
        err.kind,
        ErrorKind::Store(dynamodel::error::StoreErrorKind::ConditionFailed)
    );
}

#[test]
fn invalid_values_block_the_save() {
    let (conn, connector) = connection();
    let (model, store) = test_model(&conn, &connector);

    let mut record = model.new_record(item("first", "one", "hello")).unwrap();
    record.set("count", 500);
    store.clear_calls();

    let err: Error = record.save().unwrap_err().into();
    assert!(matches!(err.kind, ErrorKind::Validation { .. }));
    assert!(store.calls().is_empty());
}

#[test]
fn record_update_applies_actions_and_merges_result() {
    let (conn, connector) = connection();
    let (model, _) = test_model(&conn, &connector);

    let mut values = item("first", "one", "hello");
    values.insert("count".into(), Value::from(3));
    let mut record = model.new_record(values).unwrap();
    record.save().unwrap();

    record
        .update(
            &[
                UpdateAction::add("count", 2),
                UpdateAction::set("baz", "bumped"),
            ],
            Some(Condition::eq("count", 3)),
        )
        .unwrap();

    assert_eq!(record.get("count"), Some(&Value::Int(5)));
    assert_eq!(record.get("baz"), Some(&Value::from("bumped")));

    record.update(&[UpdateAction::remove("count")], None).unwrap();
    assert_eq!(record.get("count"), None);
}

#[test]
fn update_item_validates_values_and_rejects_key_updates() {
    let (conn, connector) = connection();
    let (model, _) = test_model(&conn, &connector);
    model
        .new_record(item("first", "one", "hello"))
        .unwrap()
        .save()
        .unwrap();

    let err: Error = model
        .update_item(
            &key("first", "one"),
            &[UpdateAction::set("count", 1000)],
            UpdateOptions::default(),
        )
        .unwrap_err()
        .into();
    assert!(matches!(err.kind, ErrorKind::Validation { .. }));

    let err: Error = model
        .update_item(
            &key("first", "one"),
            &[UpdateAction::set("bar", "two")],
            UpdateOptions::default(),
        )
        .unwrap_err()
        .into();
    assert!(matches!(err.kind, ErrorKind::Validation { .. }));

    let returned = model
        .update_item(
            &key("first", "one"),
            &[UpdateAction::set("count", 10)],
            UpdateOptions {
                return_values: ReturnValues::AllNew,
                ..UpdateOptions::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(returned["count"], Value::Int(10));
    assert_eq!(returned["baz"], Value::from("hello"));
}

#[test]
fn delete_by_uuid_key_then_get_is_absent() {
    let (conn, _) = connection();
    let model = Model::builder("Device")
        .table(TableSpec::new("devices").hash_key("id").read(1).write(1))
        .schema(
            Schema::builder("Device")
                .field("id", Field::uuid().required())
                .field("name", Field::text())
                .build(),
        )
        .build(&conn)
        .unwrap();
    model.table().create_table().unwrap();

    let id = Uuid::new_v4();
    let mut record = model
        .new_record(values([("id", Value::from(id)), ("name", Value::from("probe"))]))
        .unwrap();
    record.save().unwrap();

    // text form of the identifier finds the same item
    let by_text = values([("id", id.to_string())]);
    let loaded = model.get(&by_text).unwrap().unwrap();
    assert_eq!(loaded.get("id"), Some(&Value::Uuid(id)));

    loaded.delete().unwrap();
    assert!(model.get(&values([("id", id)])).unwrap().is_none());
}

#[test]
fn ulid_keys_are_stored_as_text() {
    let (conn, connector) = connection();
    let model = Model::builder("Event")
        .table(TableSpec::new("events").hash_key("id").on_demand())
        .schema(
            Schema::builder("Event")
                .field("id", Field::ulid().required())
                .build(),
        )
        .build(&conn)
        .unwrap();
    model.table().create_table().unwrap();

    let id = ulid::Ulid::new();
    model
        .new_record(values([("id", id)]))
        .unwrap()
        .save()
        .unwrap();

    let stored = connector.store_for(model.table().connection()).items("events");
    assert_eq!(stored[0]["id"], s(&id.to_string()));

    model.delete_key(&values([("id", id)])).unwrap();
    assert!(model.get(&values([("id", id)])).unwrap().is_none());
}
