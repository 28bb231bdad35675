use super::{validator::*, *};
use crate::value::{Value, Values, values};
use proptest::prelude::*;
use uuid::Uuid;

fn model_schema() -> Schema {
    Schema::builder("ModelSchema")
        .field("foo", Field::text().required())
        .field("baz", Field::text().required())
        .build()
}

#[test]
fn partial_validation_skips_absent_required_fields() {
    let schema = model_schema();
    let input = values([("foo", "foo")]);

    assert!(schema.validate(&input, true).is_ok());

    let err = schema.validate(&input, false).unwrap_err();
    assert!(
        err.to_string()
            .starts_with("Validation failed for schema ModelSchema. Errors: {\"baz\""),
        "unexpected message: {err}"
    );
    assert_eq!(err.fields(), vec!["baz"]);
}

#[test]
fn partial_validation_still_checks_present_fields() {
    let schema = Schema::builder("Book")
        .field("id", Field::text().required())
        .field("rank", Field::number().validator(Lte::new(5)))
        .build();

    let bad_type = values([("rank", "bar")]);
    assert!(schema.validate(&bad_type, true).is_err());

    let out_of_range = values([("rank", 10)]);
    let err = schema.validate(&out_of_range, true).unwrap_err();
    assert_eq!(err.errors["rank"], vec!["10 must be <= 5".to_string()]);
}

#[test]
fn unknown_fields_are_rejected() {
    let schema = model_schema();
    let input = values([("foo", "a"), ("baz", "b"), ("nope", "c")]);

    let err = schema.validate(&input, false).unwrap_err();
    assert_eq!(err.fields(), vec!["nope"]);
}

#[test]
fn null_counts_as_absent() {
    let schema = model_schema();
    let mut input = values([("foo", "a")]);
    input.insert("baz".into(), Value::Null);

    assert!(schema.validate(&input, false).is_err());

    let out = schema.validate(&input, true).unwrap();
    assert!(!out.contains_key("baz"));
}

#[test]
fn normalization_parses_identifiers_and_widens_numbers() {
    let schema = Schema::builder("Doc")
        .field("id", Field::uuid().required())
        .field("score", Field::float())
        .build();

    let id = "cc1dea15-c359-455a-a53e-c0a7a31ee022";
    let out = schema
        .validate(&values([("id", Value::from(id)), ("score", Value::Int(3))]), false)
        .unwrap();

    assert_eq!(out["id"], Value::Uuid(Uuid::parse_str(id).unwrap()));
    assert_eq!(out["score"], Value::Float(3.0));
}

#[test]
fn fragments_merge_in_declaration_order() {
    let super_mixin = Fragment::new("SuperMixin").field("bbq", Field::text());
    let mixin = Fragment::new("Mixin")
        .extends(super_mixin)
        .field("bar", Field::text());

    let schema = Schema::builder("Model")
        .extends(mixin)
        .field("foo", Field::number().required())
        .field("baz", Field::text().required())
        .build();

    let mut names: Vec<_> = schema.fields().keys().cloned().collect();
    names.sort();
    assert_eq!(names, vec!["bar", "baz", "bbq", "foo"]);
}

#[test]
fn later_fragment_overrides_earlier() {
    let numeric = Fragment::new("MixinTwo").field("bar", Field::number());
    let textual = Fragment::new("MixinOne").field("bar", Field::text());

    let schema = Schema::builder("Model")
        .extends(numeric)
        .extends(textual)
        .field("foo", Field::number().required())
        .build();

    assert!(schema.field("bar").unwrap().is_kind(FieldKind::Text));
}

#[test]
fn own_fields_override_fragments() {
    let mixin = Fragment::new("Mixin").field("foo", Field::number());
    let schema = Schema::builder("Model")
        .extends(mixin)
        .field("foo", Field::text().required())
        .build();

    let foo = schema.field("foo").unwrap();
    assert!(foo.is_kind(FieldKind::Text));
    assert!(foo.is_required());
}

#[test]
fn derived_types_keep_their_base_kind() {
    let sub = Field::text().derived("SubclassedString");
    let sub_sub = sub.derived("SubSubclassedString").required();

    assert!(sub_sub.is_kind(FieldKind::Text));
    assert_eq!(sub_sub.type_name(), "SubSubclassedString");
    assert!(sub_sub.is_required());
}

#[test]
fn custom_validators_report_under_the_field() {
    let schema = Schema::builder("Model")
        .field("foo", Field::number().required())
        .field(
            "bar",
            Field::text().validator(validator_fn("bar", |v| {
                if v.as_text() == Some("bar") {
                    Ok(())
                } else {
                    Err("bar must be bar".to_string())
                }
            })),
        )
        .build();

    let err = schema
        .validate(&values([("foo", Value::Int(1)), ("bar", Value::from("x"))]), false)
        .unwrap_err();
    assert_eq!(err.errors["bar"], vec!["bar: bar must be bar".to_string()]);
}

proptest! {
    #[test]
    fn own_field_set_is_always_the_declared_set(names in prop::collection::btree_set("[a-z]{1,8}", 0..12)) {
        let mut builder = Schema::builder("Prop");
        for name in &names {
            builder = builder.field(name.clone(), Field::text());
        }
        let schema = builder.build();

        let declared: Vec<_> = schema.fields().keys().cloned().collect();
        let expected: Vec<_> = names.iter().cloned().collect();
        prop_assert_eq!(declared, expected);

        let empty = Values::new();
        prop_assert!(schema.validate(&empty, false).is_ok());
    }
}
