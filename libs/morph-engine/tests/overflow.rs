use morph_api::converter::map_string;
use morph_api::{ConvertError, Overflow, Record, Value};
use morph_engine::{Adapter, AdapterOptions, ErrorKind, OverwritePolicy, Scope};
use pretty_assertions::assert_eq;
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Tagged {
    name: String,
    additional_data: Overflow,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Contact {
    name: String,
    email: String,
}

fn tagged(name: &str, extra: Value) -> Tagged {
    Tagged {
        name: name.into(),
        additional_data: Overflow::from_value(&extra).unwrap(),
    }
}

#[test]
fn fields_win_by_default() {
    let adapter = Adapter::new();
    let source = tagged("Field", json!({"name": "AD", "email": "e@x"}));
    let contact: Contact = adapter.make(&source).unwrap();

    assert_eq!(
        contact,
        Contact {
            name: "Field".into(),
            email: "e@x".into(),
        }
    );
}

#[test]
fn additional_data_can_win() {
    let adapter = Adapter::with_options(
        AdapterOptions::default().with_overwrite_policy(OverwritePolicy::PreferAdditionalData),
    );
    let source = tagged("Field", json!({"name": "AD"}));
    let contact: Contact = adapter.make(&source).unwrap();
    assert_eq!(contact.name, "AD");
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct NameRow {
    name: String,
    additional_data: Overflow,
}

#[test]
fn full_coverage_leaves_slot_absent() {
    let adapter = Adapter::new();
    let mut row = NameRow {
        name: String::new(),
        additional_data: Overflow::from_value(&json!({"stale": true})).unwrap(),
    };
    adapter.adapt(&mut row, &Contact { name: "n".into(), email: String::new() }).unwrap();

    assert_eq!(row.name, "n");
    assert!(row.additional_data.is_absent());
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Sparse {
    name: String,
    count: i32,
    active: bool,
    note: String,
}

#[test]
fn zero_values_are_omitted_unless_requested() {
    let source = Sparse {
        name: "x".into(),
        ..Sparse::default()
    };

    let row: NameRow = Adapter::new().make(&source).unwrap();
    assert!(row.additional_data.is_absent());

    let inclusive = Adapter::with_options(AdapterOptions::default().with_include_zero_values(true));
    let row: NameRow = inclusive.make(&source).unwrap();
    assert_eq!(
        row.additional_data.to_value().unwrap(),
        Some(json!({"count": 0, "active": false, "note": ""}))
    );
}

#[test]
fn overflow_keys_match_case_insensitively_when_enabled() {
    let source = tagged("n", json!({"EMAIL": "e@x"}));

    let strict: Contact = Adapter::new().make(&source).unwrap();
    assert_eq!(strict.email, "");

    let relaxed = Adapter::with_options(AdapterOptions::default().with_case_insensitive(true));
    let contact: Contact = relaxed.make(&source).unwrap();
    assert_eq!(contact.email, "e@x");
}

#[test]
fn malformed_overflow_is_a_decode_error() {
    let adapter = Adapter::new();

    let broken = Tagged {
        name: "n".into(),
        additional_data: Overflow::from_bytes(b"{oops".to_vec()),
    };
    let err = adapter.make::<Contact, _>(&broken).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(err.to_string().starts_with("unmarshaling additional data"));

    let array = Tagged {
        name: "n".into(),
        additional_data: Overflow::from_bytes(b"[1, 2]".to_vec()),
    };
    let err = adapter.make::<Contact, _>(&array).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn null_overflow_is_nothing_to_do() {
    let adapter = Adapter::new();
    let source = Tagged {
        name: "n".into(),
        additional_data: Overflow::from_bytes(b"null".to_vec()),
    };
    let contact: Contact = adapter.make(&source).unwrap();
    assert_eq!(contact.name, "n");
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Counter {
    x: i32,
    y: i32,
    z: i32,
}

#[test]
fn failing_keys_are_dropped_without_fallback() {
    let adapter = Adapter::new();
    adapter.register_converter(Scope::destination::<Counter>(), "x", |_| Err(ConvertError::new("nope")));
    adapter.register_converter(Scope::destination::<Counter>(), "y", |_| Ok(None));

    let source = tagged("n", json!({"x": 10, "y": 20, "z": "not a number"}));
    let mut counter = Counter { x: 1, y: 2, z: 3 };
    adapter.adapt(&mut counter, &source).unwrap();

    assert_eq!(counter, Counter { x: 1, y: 2, z: 3 });
}

#[test]
fn converters_apply_to_overflow_keys() {
    let adapter = Adapter::new();
    adapter.register_converter(Scope::Global, "email", map_string(str::to_uppercase));

    let contact: Contact = adapter.make(&tagged("n", json!({"email": "e@x"}))).unwrap();
    assert_eq!(contact.email, "E@X");
}

#[test]
fn validator_rejection_from_overflow_aborts() {
    let adapter = Adapter::new();
    adapter.register_validator(Scope::destination::<Contact>(), "email", |v| match v.as_str() {
        Some(s) if s.contains('@') => Ok(()),
        _ => Err("invalid email".into()),
    });

    let err = adapter.make::<Contact, _>(&tagged("n", json!({"email": "nope"}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conversion);
    assert_eq!(err.field(), Some("email"));
    assert!(err.to_string().starts_with("unmarshaling additional data"));

    let ok: Contact = adapter.make(&tagged("n", json!({"email": "a@b"}))).unwrap();
    assert_eq!(ok.email, "a@b");
}

#[test]
fn protocol_directions_can_be_disabled() {
    let adapter = Adapter::with_options(
        AdapterOptions::default()
            .with_unmarshal_disabled(true)
            .with_marshal_disabled(true),
    );

    let contact: Contact = adapter.make(&tagged("n", json!({"email": "e@x"}))).unwrap();
    assert_eq!(contact.email, "");

    let row: NameRow = adapter
        .make(&Contact {
            name: "n".into(),
            email: "e@x".into(),
        })
        .unwrap();
    assert!(row.additional_data.is_absent());
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Extras {
    name: String,
    #[record(overflow)]
    extras: Overflow,
}

#[test]
fn tagged_slot_is_used_under_any_name() {
    let adapter = Adapter::new();
    let row: Extras = adapter
        .make(&Contact {
            name: "n".into(),
            email: "e@x".into(),
        })
        .unwrap();
    assert_eq!(row.extras.to_value().unwrap(), Some(json!({"email": "e@x"})));

    let back: Contact = adapter.make(&row).unwrap();
    assert_eq!(back.email, "e@x");
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Profile {
    name: String,
    city: String,
    additional_data: Overflow,
}

#[test]
fn source_overflow_is_not_remarshaled() {
    let adapter = Adapter::new();
    let source = Profile {
        name: "n".into(),
        city: "Oslo".into(),
        additional_data: Overflow::from_value(&json!({"nickname": "J"})).unwrap(),
    };
    let row: NameRow = adapter.make(&source).unwrap();
    assert_eq!(row.additional_data.to_value().unwrap(), Some(json!({"city": "Oslo"})));
}
