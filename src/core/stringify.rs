//! Purpose: Top-level encode entry point with deferred splice-through.
//! Exports: `to_string`.
//! Role: Session-scoped wrapper around `serde_json::to_string`.
//! Invariants: Untouched deferred values re-emit their original text byte-for-byte.
//! Invariants: The previous session is restored before returning, on every path.
//! Invariants: Output with no issued sigils is the encoder's output untouched.

use serde::Serialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::session::EncodeScope;
use crate::core::splice::splice;

/// Encodes `value` as JSON text.
///
/// Every unmaterialized [`DeferredValue`](crate::DeferredValue) reached
/// during encoding contributes a sigil instead of its content; the
/// splice pass then substitutes the original raw text, so values that
/// were never inspected round-trip without a decode or re-encode.
/// Nested `to_string` calls each get their own session.
pub fn to_string<T>(value: &T) -> Result<String, Error>
where
    T: ?Sized + Serialize,
{
    let scope = EncodeScope::open();
    let encoded = serde_json::to_string(value);
    let registry = scope.close();
    let encoded = encoded.map_err(|err| {
        Error::new(ErrorKind::Encode)
            .with_message("value failed to encode")
            .with_source(err)
    })?;
    if registry.is_empty() {
        return Ok(encoded);
    }
    splice(&encoded, &registry)
}
