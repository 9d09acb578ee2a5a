use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::AbortHandle;
use json_struct::{
    array, assert, bool, dict, float, integer, literal, nan, object, option, parse, parse_async,
    parse_async_abortable, serialize, string, tuple, union, unknown, AsyncParseError, Definition, OperationKind,
    Reason, Schema, SchemaError, Value,
};
use serde_json::json;

fn v(json: serde_json::Value) -> Value { Value::from(json) }

fn user() -> Schema {
    object(|o| {
        o.field("name", string());
        o.field("age", integer());
        o.field("tags", array(string()).optional());
    })
    .unwrap()
}

#[test]
fn parsing_is_deterministic() {
    let s = user();
    let inputs = [json!({"name": "a", "age": 1}), json!({"name": 1}), json!([1])];
    for input in inputs {
        assert_eq!(parse(&s, input.clone()), parse(&s, input.clone()));
        let fresh = user();
        assert_eq!(parse(&s, input.clone()), parse(&fresh, input));
    }
}

#[test]
fn serialize_inverts_parse() {
    let s = object(|o| {
        o.field("id", integer());
        o.field("point", tuple([float(), float()]));
        o.field("extra", dict(bool()));
        o.field("note", string().nullable());
    })
    .unwrap();
    let raw = v(json!({"id": 3, "point": [1.5, -2.0], "extra": {"x": true}, "note": null}));
    let typed = parse(&s, raw.clone()).unwrap();
    assert_eq!(serialize(&s, typed).unwrap(), raw);
}

#[test]
fn restructured_objects_round_trip() {
    let s = object(|o| {
        let first = o.field("first_name", string());
        let age = o.field("age", integer());
        Definition::object([("name", Definition::from(first)), ("years", age.into())])
    })
    .unwrap();
    let raw = v(json!({"first_name": "Ada", "age": 36}));
    let typed = parse(&s, raw.clone()).unwrap();
    assert_eq!(typed, v(json!({"name": "Ada", "years": 36})));
    assert_eq!(serialize(&s, typed).unwrap(), raw);
}

#[test]
fn noop_operations_return_their_input() {
    for s in [unknown(), option(unknown()), unknown().nullable().describe("anything")] {
        let op = s.operation(OperationKind::Parse);
        assert!(op.is_noop(), "{}", s.name());
        let input = v(json!({"deep": [1, {"x": null}]}));
        assert_eq!(parse(&s, input.clone()).unwrap(), input);
    }
}

#[test]
fn unknown_key_policies() {
    let base = object(|o| {
        o.field("a", integer());
        o.field("b", integer());
    })
    .unwrap();
    let input = json!({"a": 1, "b": 2, "c": 3});

    assert_eq!(parse(&base, input.clone()).unwrap(), v(input.clone()));
    assert_eq!(parse(&base.strip(), input.clone()).unwrap(), v(json!({"a": 1, "b": 2})));

    let err = parse(&base.strict(), input.clone()).unwrap_err();
    assert_eq!(err.path.to_string(), ".c");
    assert_eq!(err.reason, Reason::ExcessField("c".into()));
    assert_eq!(
        err.message(),
        "Failed parsing at .c. Reason: Encountered disallowed excess key \"c\" on an object"
    );

    assert_eq!(parse(&base.strict().strip(), input.clone()).unwrap(), v(json!({"a": 1, "b": 2})));
    assert!(serialize(&base.strict(), input.clone()).is_err());
    assert_eq!(serialize(&base.strip(), input).unwrap(), v(json!({"a": 1, "b": 2})));
}

#[test]
fn tuple_length_is_exact() {
    let s = tuple([string(), integer()]);
    assert!(parse(&s, json!(["a", 1])).is_ok());
    for bad in [json!(["a"]), json!(["a", 1, 2])] {
        let err = parse(&s, bad).unwrap_err();
        assert!(err.path.is_root());
        assert!(matches!(err.reason, Reason::InvalidTupleSize { expected: 2, .. }));
    }
}

#[test]
fn union_takes_the_first_accepting_variant() {
    let tagged = |tag: &'static str| string().transform(move |_| Ok(Value::from(tag)), Ok);
    let s = union([literal("x").unwrap().transform(|_| Ok(Value::from("lit")), Ok), tagged("any")]).unwrap();
    assert_eq!(parse(&s, "x").unwrap(), Value::from("lit"));
    assert_eq!(parse(&s, "y").unwrap(), Value::from("any"));

    let err = parse(&s, 1).unwrap_err();
    let msg = err.message();
    assert!(msg.starts_with("Failed parsing at root. Reason: Invalid union with following errors:"));
    assert_eq!(msg.matches("\n- ").count(), 2);
}

#[test]
fn chained_transforms_unwind_in_reverse() {
    let append = |suffix: &'static str| {
        move |v: Value| -> Result<Value, String> {
            Ok(Value::from(format!("{}{suffix}", v.as_str().unwrap_or_default())))
        }
    };
    let strip = |suffix: &'static str| {
        move |v: Value| -> Result<Value, String> {
            match v.as_str().and_then(|s| s.strip_suffix(suffix)) {
                Some(rest) => Ok(Value::from(rest)),
                None => Err(format!("missing suffix {suffix}")),
            }
        }
    };
    let s = string().transform(append("-a"), strip("-a")).transform(append("-b"), strip("-b"));
    assert_eq!(parse(&s, "x").unwrap(), Value::from("x-a-b"));
    assert_eq!(serialize(&s, "x-a-b").unwrap(), Value::from("x"));
    assert_eq!(
        serialize(&s, "x-b-a").unwrap_err().message(),
        "Failed serializing at root. Reason: missing suffix -b"
    );
}

#[test]
fn defaults_fill_only_undefined() {
    let s = object(|o| {
        o.field("role", string().default("guest"));
    })
    .unwrap();
    assert_eq!(parse(&s, json!({})).unwrap(), v(json!({"role": "guest"})));
    assert_eq!(parse(&s, json!({"role": "admin"})).unwrap(), v(json!({"role": "admin"})));
    assert!(parse(&s, json!({"role": null})).is_err());
}

#[test]
fn nan_needs_its_own_constructor() {
    assert_eq!(literal(f64::NAN).err(), Some(SchemaError::NanLiteral));
    let s = nan();
    assert!(parse(&s, Value::Number(f64::NAN)).is_ok());
    assert!(parse(&s, 1.0).is_err());
}

#[test]
fn assert_matches_parse_validation() {
    let s = user();
    assert!(assert(&s, json!({"name": "a", "age": 1})).is_ok());
    let parse_err = parse(&s, json!({"name": "a", "age": "x"})).unwrap_err();
    let assert_err = assert(&s, json!({"name": "a", "age": "x"})).unwrap_err();
    assert_eq!(parse_err.path, assert_err.path);
    assert_eq!(parse_err.reason, assert_err.reason);
}

#[tokio::test]
async fn async_taint_is_confined_to_the_async_branch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = {
        let calls = calls.clone();
        string().async_refine(move |value| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if value == Value::from("taken") { Err("Name is taken".to_string()) } else { Ok(()) }
            }
        })
    };
    let sibling = array(integer());
    let s = object(|o| {
        o.field("name", counted.clone());
        o.field("ids", sibling.clone());
    })
    .unwrap();

    assert!(s.is_async());
    assert!(!sibling.is_async());

    let err = parse(&s, json!({"name": "free", "ids": []})).unwrap_err();
    assert_eq!(err.reason, Reason::UnexpectedAsync);

    let out = parse_async(&s, json!({"name": "free", "ids": [1, 2]})).await.unwrap();
    assert_eq!(out, v(json!({"name": "free", "ids": [1, 2]})));
    assert!(s.is_compiled(OperationKind::ParseAsync));
    assert!(sibling.is_compiled(OperationKind::Parse));
    assert!(!sibling.is_compiled(OperationKind::ParseAsync));

    let err = parse_async(&s, json!({"name": "taken", "ids": []})).await.unwrap_err();
    assert_eq!(err.message(), "Failed parsing at .name. Reason: Name is taken");

    // structural failures never reach phase two
    let before = calls.load(Ordering::SeqCst);
    let err = parse_async(&s, json!({"name": "free", "ids": ["x"]})).await.unwrap_err();
    assert_eq!(err.path.to_string(), ".ids[0]");
    assert_eq!(calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn aborted_parse_produces_no_value() {
    let s = string().async_refine(|_| futures::future::pending::<Result<(), String>>());
    let (handle, registration) = AbortHandle::new_pair();
    handle.abort();
    let out = parse_async_abortable(&s, "x", registration).await;
    assert_eq!(out, Err(AsyncParseError::Aborted));

    let (_handle, registration) = AbortHandle::new_pair();
    let ok = string().async_refine(|_| async { Ok(()) });
    assert_eq!(parse_async_abortable(&ok, "x", registration).await, Ok(Value::from("x")));
}

#[tokio::test]
async fn async_checks_settle_before_later_steps() {
    let s = string()
        .async_refine(|_| async { Err("async check".to_string()) })
        .refine(|_| Err("sync check".to_string()))
        .transform(|_| Err("transform ran on rejected value".to_string()), Ok);
    let err = parse_async(&s, "x").await.unwrap_err();
    assert_eq!(err.message(), "Failed parsing at root. Reason: async check");
}

#[tokio::test]
async fn async_union_tries_the_next_variant() {
    let first = string().async_refine(|_| async { Err("first variant rejected".to_string()) });
    let second = string().transform(|_| Ok(Value::from("second")), Ok);
    let s = object(|o| {
        o.field("pick", union([first, second]).unwrap());
    })
    .unwrap();
    let out = parse_async(&s, json!({"pick": "x"})).await.unwrap();
    assert_eq!(out, v(json!({"pick": "second"})));
}
