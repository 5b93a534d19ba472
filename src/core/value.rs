//! Purpose: Deferred JSON container values that decode on first structural use.
//! Exports: `parse`, `Parsed`, `DeferredValue`, `Kind`, `FieldDescriptor`.
//! Role: Core wrapper type; holds raw text until a caller needs real structure.
//! Invariants: Materialization is one-way and idempotent; a failed decode leaves
//! the state unmaterialized and the error is reported to the touching caller.
//! Invariants: Kind, lock, and materialization probes never trigger a decode.
//! Invariants: Mutations apply to the decoded value and its shadow mirror together.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::trace;

use crate::core::error::{Error, ErrorKind};
use crate::core::session;
use crate::json;

/// Structural kind of a deferred container, read off the first byte of
/// the raw text without decoding it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    Object,
    Array,
}

/// Result of [`parse`]: container text defers, everything else decodes
/// eagerly since there is no structure to defer.
#[derive(Clone, Debug)]
pub enum Parsed {
    Scalar(Value),
    Deferred(DeferredValue),
}

/// Field metadata reported by [`DeferredValue::descriptor`]. Present
/// fields are always enumerable; `configurable` and `writable` flip to
/// false once the value is extension-locked.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub value: Value,
    pub enumerable: bool,
    pub configurable: bool,
    pub writable: bool,
}

/// A JSON container that decodes on first structural use.
///
/// Cloning shares state: every clone sees the same materialization,
/// mutations, and lock status, so one value can sit inside several
/// outer structures and still splice independently per occurrence.
#[derive(Clone, Debug)]
pub struct DeferredValue {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    raw: String,
    kind: Kind,
    cell: RwLock<Cell>,
}

#[derive(Debug)]
struct Cell {
    state: State,
    shadow: Value,
    locked: bool,
}

#[derive(Debug)]
enum State {
    Unmaterialized,
    Materialized(Value),
}

/// Parses `text` into a [`Parsed`] value.
///
/// Text whose first byte is `{` or `[` is wrapped without decoding;
/// malformed container text is only discovered at the first structural
/// touch. All other inputs (scalars, or containers behind leading
/// whitespace) go straight through the decode boundary.
pub fn parse(text: &str) -> Result<Parsed, Error> {
    match text.as_bytes().first() {
        Some(b'{') => Ok(Parsed::Deferred(DeferredValue::new(text, Kind::Object))),
        Some(b'[') => Ok(Parsed::Deferred(DeferredValue::new(text, Kind::Array))),
        _ => json::from_str(text).map(Parsed::Scalar).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("malformed JSON text")
                .with_source(err)
        }),
    }
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, Cell> {
        self.cell.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Cell> {
        self.cell.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeferredValue {
    fn new(raw: &str, kind: Kind) -> Self {
        let shadow = match kind {
            Kind::Object => Value::Object(Map::new()),
            Kind::Array => Value::Array(Vec::new()),
        };
        Self {
            inner: Arc::new(Inner {
                raw: raw.to_string(),
                kind,
                cell: RwLock::new(Cell {
                    state: State::Unmaterialized,
                    shadow,
                    locked: false,
                }),
            }),
        }
    }

    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    pub fn is_object(&self) -> bool {
        self.inner.kind == Kind::Object
    }

    pub fn is_array(&self) -> bool {
        self.inner.kind == Kind::Array
    }

    /// Whether the raw text has been decoded yet. Diagnostic probe; does
    /// not trigger a decode.
    pub fn is_materialized(&self) -> bool {
        matches!(self.inner.read().state, State::Materialized(_))
    }

    pub fn is_locked(&self) -> bool {
        self.inner.read().locked
    }

    /// The original serialized span this value was parsed from.
    pub fn raw_text(&self) -> &str {
        &self.inner.raw
    }

    /// Decodes the raw text if that has not happened yet. Idempotent;
    /// every structural accessor funnels through here.
    pub fn materialize(&self) -> Result<(), Error> {
        if self.is_materialized() {
            return Ok(());
        }
        let mut cell = self.inner.write();
        if matches!(cell.state, State::Materialized(_)) {
            return Ok(());
        }
        let decoded: Value = json::from_str(&self.inner.raw).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message(match self.inner.kind {
                    Kind::Object => "malformed object text",
                    Kind::Array => "malformed array text",
                })
                .with_source(err)
        })?;
        // Sequences mirror their elements into the shadow immediately so
        // direct element iteration observes the decoded contents.
        if let (Value::Array(mirror), Value::Array(items)) = (&mut cell.shadow, &decoded) {
            mirror.clear();
            mirror.extend(items.iter().cloned());
        }
        trace!(kind = ?self.inner.kind, raw_len = self.inner.raw.len(), "materialized deferred value");
        cell.state = State::Materialized(decoded);
        Ok(())
    }

    fn with_decoded<R>(&self, f: impl FnOnce(&Value, bool) -> R) -> Result<R, Error> {
        self.materialize()?;
        let cell = self.inner.read();
        match &cell.state {
            State::Materialized(decoded) => Ok(f(decoded, cell.locked)),
            State::Unmaterialized => Err(Error::new(ErrorKind::Internal)
                .with_message("materialize succeeded without a decoded value")),
        }
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Value, &mut Value) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.materialize()?;
        let mut cell = self.inner.write();
        if cell.locked {
            return Err(Error::new(ErrorKind::Locked).with_message("value is extension-locked"));
        }
        let Cell { state, shadow, .. } = &mut *cell;
        match state {
            State::Materialized(decoded) => f(decoded, shadow),
            State::Unmaterialized => Err(Error::new(ErrorKind::Internal)
                .with_message("materialize succeeded without a decoded value")),
        }
    }

    /// Reads `key` from a map-like value. Sequence-like values report
    /// every string key as absent, matching delegation to the decoded
    /// value's own lookup semantics.
    pub fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        self.with_decoded(|decoded, _| decoded.get(key).cloned())
    }

    /// Reads element `index` from a sequence-like value. Out-of-range
    /// indexes (including any index of an empty sequence) are absent.
    pub fn index(&self, index: usize) -> Result<Option<Value>, Error> {
        self.with_decoded(|decoded, _| decoded.get(index).cloned())
    }

    pub fn has(&self, key: &str) -> Result<bool, Error> {
        self.with_decoded(|decoded, _| decoded.get(key).is_some())
    }

    pub fn len(&self) -> Result<usize, Error> {
        self.with_decoded(|decoded, _| match decoded {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        })
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Enumerates keys: map keys for map-like values, decimal element
    /// indexes for sequence-like values.
    pub fn keys(&self) -> Result<Vec<String>, Error> {
        self.with_decoded(|decoded, _| match decoded {
            Value::Object(map) => map.keys().cloned().collect(),
            Value::Array(items) => (0..items.len()).map(|index| index.to_string()).collect(),
            _ => Vec::new(),
        })
    }

    /// Writes `key` on a map-like value, mirroring the write into the
    /// shadow container.
    pub fn set(&self, key: &str, value: Value) -> Result<(), Error> {
        self.mutate(|decoded, shadow| {
            let Value::Object(map) = decoded else {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("string keys require a map-like value"));
            };
            map.insert(key.to_string(), value.clone());
            if let Value::Object(mirror) = shadow {
                mirror.insert(key.to_string(), value);
            }
            Ok(())
        })
    }

    /// Replaces element `index`, or appends when `index` equals the
    /// current length. Writing further past the end is a usage error.
    pub fn set_index(&self, index: usize, value: Value) -> Result<(), Error> {
        self.mutate(|decoded, shadow| {
            let Value::Array(items) = decoded else {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("numeric indexes require a sequence-like value"));
            };
            if index > items.len() {
                return Err(Error::new(ErrorKind::Usage).with_message(format!(
                    "index {index} is past the end ({} elements)",
                    items.len()
                )));
            }
            if index == items.len() {
                items.push(value.clone());
            } else {
                items[index] = value.clone();
            }
            if let Value::Array(mirror) = shadow {
                if index == mirror.len() {
                    mirror.push(value);
                } else if index < mirror.len() {
                    mirror[index] = value;
                }
            }
            Ok(())
        })
    }

    /// Deletes `key` from a map-like value and its shadow, returning the
    /// removed value. Sequence-like values reject deletion.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, Error> {
        self.mutate(|decoded, shadow| {
            let Value::Object(map) = decoded else {
                return Err(
                    Error::new(ErrorKind::Usage).with_message("delete requires a map-like value")
                );
            };
            let removed = map.remove(key);
            if let Value::Object(mirror) = shadow {
                mirror.remove(key);
            }
            Ok(removed)
        })
    }

    /// Defines `key` as a plain data field. JSON values carry no custom
    /// attribute semantics, so this is `set` under a definition-shaped
    /// name.
    pub fn define(&self, key: &str, value: Value) -> Result<(), Error> {
        self.set(key, value)
    }

    /// Extension-locks the value. Before the first lock every key is
    /// copied from the decoded value onto the shadow, so enumeration
    /// against the locked shadow cannot report keys the shadow lacks.
    /// Idempotent; locked values reject writes, deletes, and defines.
    pub fn lock(&self) -> Result<(), Error> {
        self.materialize()?;
        let mut cell = self.inner.write();
        if cell.locked {
            return Ok(());
        }
        let Cell { state, shadow, locked } = &mut *cell;
        if let State::Materialized(decoded) = state {
            if let (Value::Object(mirror), Value::Object(map)) = (shadow, &*decoded) {
                for (key, value) in map {
                    mirror.insert(key.clone(), value.clone());
                }
            }
        }
        *locked = true;
        Ok(())
    }

    /// Looks up the descriptor for `key`. Absent keys yield `None`.
    pub fn descriptor(&self, key: &str) -> Result<Option<FieldDescriptor>, Error> {
        self.with_decoded(|decoded, locked| {
            decoded.get(key).map(|value| FieldDescriptor {
                value: value.clone(),
                enumerable: true,
                configurable: !locked,
                writable: !locked,
            })
        })
    }

    /// Key/value pairs of a map-like value. Sequence-like values yield
    /// an empty list; use [`DeferredValue::elements`] for those.
    pub fn entries(&self) -> Result<Vec<(String, Value)>, Error> {
        self.with_decoded(|decoded, _| match decoded {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Elements as observed through the shadow mirror, the path direct
    /// iteration takes without consulting the decoded value. Map-like
    /// values reflect only the keys the shadow has mirrored (writes
    /// before locking, every key after).
    pub fn elements(&self) -> Result<Vec<Value>, Error> {
        self.materialize()?;
        let cell = self.inner.read();
        match &cell.shadow {
            Value::Array(items) => Ok(items.clone()),
            Value::Object(map) => Ok(map.values().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Materializes and returns a full copy of the decoded value.
    pub fn to_value(&self) -> Result<Value, Error> {
        self.with_decoded(|decoded, _| decoded.clone())
    }
}

impl Serialize for DeferredValue {
    /// The serialization hook. Inside an encode session an unmaterialized
    /// value encodes as its sigil, an ordinary string the splice pass
    /// later replaces with the raw text. Everywhere else it materializes
    /// and encodes the decoded structure.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        {
            let cell = self.inner.read();
            if matches!(cell.state, State::Unmaterialized) {
                if let Some(sigil) = session::issue_sigil(&self.inner.raw) {
                    return serializer.serialize_str(&sigil);
                }
            }
        }
        self.materialize().map_err(serde::ser::Error::custom)?;
        let cell = self.inner.read();
        match &cell.state {
            State::Materialized(decoded) => decoded.serialize(serializer),
            State::Unmaterialized => Err(serde::ser::Error::custom(
                "materialize succeeded without a decoded value",
            )),
        }
    }
}

impl Parsed {
    pub fn is_object(&self) -> bool {
        match self {
            Parsed::Scalar(value) => value.is_object(),
            Parsed::Deferred(value) => value.is_object(),
        }
    }

    pub fn is_array(&self) -> bool {
        match self {
            Parsed::Scalar(value) => value.is_array(),
            Parsed::Deferred(value) => value.is_array(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Parsed::Deferred(_))
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Parsed::Scalar(value) => Some(value),
            Parsed::Deferred(_) => None,
        }
    }

    pub fn as_deferred(&self) -> Option<&DeferredValue> {
        match self {
            Parsed::Scalar(_) => None,
            Parsed::Deferred(value) => Some(value),
        }
    }

    pub fn into_deferred(self) -> Option<DeferredValue> {
        match self {
            Parsed::Scalar(_) => None,
            Parsed::Deferred(value) => Some(value),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        match self {
            Parsed::Scalar(value) => Ok(value.get(key).cloned()),
            Parsed::Deferred(value) => value.get(key),
        }
    }

    pub fn index(&self, index: usize) -> Result<Option<Value>, Error> {
        match self {
            Parsed::Scalar(value) => Ok(value.get(index).cloned()),
            Parsed::Deferred(value) => value.index(index),
        }
    }

    pub fn to_value(&self) -> Result<Value, Error> {
        match self {
            Parsed::Scalar(value) => Ok(value.clone()),
            Parsed::Deferred(value) => value.to_value(),
        }
    }
}

impl Serialize for Parsed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Parsed::Scalar(value) => value.serialize(serializer),
            Parsed::Deferred(value) => value.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Kind, parse};
    use serde_json::Value;

    #[test]
    fn container_prefixes_defer_without_decoding() {
        let object = parse(r#"{"a":1}"#).expect("parse");
        let deferred = object.as_deferred().expect("deferred");
        assert_eq!(deferred.kind(), Kind::Object);
        assert!(!deferred.is_materialized());
        assert_eq!(deferred.raw_text(), r#"{"a":1}"#);

        let array = parse("[1,2,3]").expect("parse");
        assert_eq!(array.as_deferred().expect("deferred").kind(), Kind::Array);
    }

    #[test]
    fn scalars_decode_eagerly() {
        assert_eq!(
            parse("\"hello\"").expect("parse").as_scalar(),
            Some(&Value::from("hello"))
        );
        assert_eq!(parse("42").expect("parse").as_scalar(), Some(&Value::from(42)));
        assert_eq!(
            parse("true").expect("parse").as_scalar(),
            Some(&Value::Bool(true))
        );
        assert_eq!(parse("null").expect("parse").as_scalar(), Some(&Value::Null));
    }

    #[test]
    fn leading_whitespace_routes_to_the_eager_path() {
        let parsed = parse(" {\"a\":1}").expect("parse");
        assert!(!parsed.is_deferred());
        assert!(parsed.is_object());
        assert_eq!(parsed.get("a").expect("get"), Some(Value::from(1)));
    }

    #[test]
    fn malformed_scalar_fails_at_parse_time() {
        assert!(parse("not json").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn malformed_container_fails_only_on_touch() {
        let parsed = parse("{broken").expect("parse accepts container prefixes");
        let deferred = parsed.as_deferred().expect("deferred");
        assert!(deferred.get("a").is_err());
        assert!(!deferred.is_materialized());
        // A later touch reports the same failure; nothing is cached.
        assert!(deferred.keys().is_err());
    }
}
