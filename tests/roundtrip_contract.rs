//! Purpose: Lock the round-trip and laziness contract of `parse`/`to_string`.
//! Exports: Integration tests only (no runtime exports).
//! Role: Assert untouched values re-encode byte-identical without invoking the decoder.
//! Invariants: Pass-through flows leave the decode counter unchanged.
//! Invariants: Each occurrence of a shared deferred child splices independently.
//! Invariants: Nested encode calls never leak sigils across sessions.

use deferred_json::{DeferredValue, Parsed, decode_calls, parse, to_string};
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use serde_json::{Value, json};

fn deferred(text: &str) -> DeferredValue {
    parse(text)
        .expect("parse")
        .into_deferred()
        .expect("container input")
}

#[test]
fn untouched_objects_round_trip_byte_identical() {
    let text = r#"{"b": 1,  "a":[2 ,3], "s":"x\ny"}"#;
    let parsed = parse(text).expect("parse");
    assert_eq!(to_string(&parsed).expect("encode"), text);
}

#[test]
fn untouched_arrays_round_trip_byte_identical() {
    let text = r#"[1, 2, {"a": 3}]"#;
    let parsed = parse(text).expect("parse");
    assert_eq!(to_string(&parsed).expect("encode"), text);
}

#[test]
fn pass_through_never_invokes_the_decoder() {
    let before = decode_calls();
    let parsed = parse(r#"{"a":1,"b":{"c":2}}"#).expect("parse");
    let out = to_string(&parsed).expect("encode");
    assert_eq!(out, r#"{"a":1,"b":{"c":2}}"#);
    assert_eq!(decode_calls(), before);
}

#[test]
fn wrapped_pass_through_splices_without_decoding() {
    #[derive(Serialize)]
    struct Envelope {
        foo: DeferredValue,
    }

    let before = decode_calls();
    let envelope = Envelope {
        foo: deferred(r#"{"a":1,"b":{"c":2}}"#),
    };
    let out = to_string(&envelope).expect("encode");
    assert_eq!(out, r#"{"foo":{"a":1,"b":{"c":2}}}"#);
    assert_eq!(decode_calls(), before);
}

#[test]
fn multiple_deferred_children_splice_in_place() {
    #[derive(Serialize)]
    struct Three {
        a: DeferredValue,
        b: DeferredValue,
        c: DeferredValue,
    }

    let three = Three {
        a: deferred(r#"{"a":1}"#),
        b: deferred(r#"{"b":2}"#),
        c: deferred(r#"{"c":3}"#),
    };
    let out = to_string(&three).expect("encode");
    assert_eq!(out, r#"{"a":{"a":1},"b":{"b":2},"c":{"c":3}}"#);
}

#[test]
fn one_child_appearing_three_times_splices_each_occurrence() {
    #[derive(Serialize)]
    struct Trio {
        one: DeferredValue,
        two: DeferredValue,
        three: DeferredValue,
    }

    let child = deferred(r#"{"v":1}"#);
    let trio = Trio {
        one: child.clone(),
        two: child.clone(),
        three: child,
    };
    let out = to_string(&trio).expect("encode");
    assert_eq!(out, r#"{"one":{"v":1},"two":{"v":1},"three":{"v":1}}"#);
}

#[test]
fn many_children_splice_with_multi_digit_ids() {
    let children: Vec<Parsed> = (0..100)
        .map(|i| parse(&format!("[{i}, {i}]")).expect("parse"))
        .collect();
    let out = to_string(&children).expect("encode");

    // Untouched children keep their original spacing.
    assert!(out.starts_with("[[0, 0],[1, 1],"));
    assert!(out.ends_with("[99, 99]]"));

    let reparsed: Value = serde_json::from_str(&out).expect("output is valid JSON");
    let expected = Value::Array((0..100).map(|i| json!([i, i])).collect());
    assert_eq!(reparsed, expected);
}

#[test]
fn scalars_pass_through_the_plain_encoder() {
    assert_eq!(to_string(&parse("42").expect("parse")).expect("encode"), "42");
    assert_eq!(
        to_string(&parse("\"hello\"").expect("parse")).expect("encode"),
        "\"hello\""
    );
    assert_eq!(
        to_string(&parse("true").expect("parse")).expect("encode"),
        "true"
    );
    assert_eq!(
        to_string(&parse("null").expect("parse")).expect("encode"),
        "null"
    );
}

#[test]
fn touched_values_reencode_from_the_decoded_structure() {
    let text = r#"{"b": 2, "a": 1}"#;
    let parsed = parse(text).expect("parse");
    let value = parsed.as_deferred().expect("container input");
    assert_eq!(value.get("a").expect("get"), Some(Value::from(1)));

    let out = to_string(&parsed).expect("encode");
    assert_ne!(out, text);
    let reparsed: Value = serde_json::from_str(&out).expect("valid JSON");
    assert_eq!(reparsed, json!({"a": 1, "b": 2}));
}

#[test]
fn plain_serde_json_encoding_materializes_instead_of_splicing() {
    // Without a deferred-aware session, the serialization hook decodes
    // and hands the encoder a normal structure.
    let before = decode_calls();
    let value = deferred(r#"{"b": 2, "a": 1}"#);
    let out = serde_json::to_string(&value).expect("encode");
    assert_eq!(out, r#"{"a":1,"b":2}"#);
    assert_eq!(decode_calls(), before + 1);
}

struct Quoted {
    payload: DeferredValue,
}

impl Serialize for Quoted {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Re-enters the encoder: the payload is rendered to text inside
        // the outer encode call and embedded as a string field.
        let text = to_string(&self.payload).map_err(serde::ser::Error::custom)?;
        let mut state = serializer.serialize_struct("Quoted", 1)?;
        state.serialize_field("payload_text", &text)?;
        state.end()
    }
}

#[test]
fn nested_encode_calls_keep_their_own_sessions() {
    #[derive(Serialize)]
    struct Outer {
        first: DeferredValue,
        quoted: Quoted,
        last: DeferredValue,
    }

    let before = decode_calls();
    let outer = Outer {
        first: deferred("[1]"),
        quoted: Quoted {
            payload: deferred(r#"{"n": 7}"#),
        },
        last: deferred("[2]"),
    };
    let out = to_string(&outer).expect("encode");
    assert_eq!(
        out,
        r#"{"first":[1],"quoted":{"payload_text":"{\"n\": 7}"},"last":[2]}"#
    );
    assert_eq!(decode_calls(), before);
}

#[test]
fn untouched_malformed_containers_still_pass_through_verbatim() {
    // Never-inspected payloads are never validated; the malformed text
    // comes back out exactly as it went in.
    let before = decode_calls();
    let parsed = parse("{broken").expect("container prefixes defer");
    assert_eq!(to_string(&parsed).expect("encode"), "{broken");
    assert_eq!(decode_calls(), before);
}
