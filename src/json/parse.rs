//! Purpose: Provide the internal runtime JSON decode entrypoints.
//! Exports: `from_str`, `decode_calls`.
//! Role: Parser boundary that centralizes simd-json usage details.
//! Invariants: Runtime JSON decoding goes through this module.
//! Invariants: Input buffers are copied once to satisfy simd-json mutable-slice API.
//! Invariants: Every invocation bumps the per-thread decode counter before decoding.
//! Notes: Error mapping is done by callsites so domain context stays explicit.

use std::cell::Cell;

use serde::de::DeserializeOwned;

thread_local! {
    static DECODE_CALLS: Cell<u64> = const { Cell::new(0) };
}

/// Number of decode-primitive invocations observed on the current thread.
///
/// Deferred values that are parsed and re-encoded untouched must leave this
/// counter unchanged; laziness tests assert against it.
pub fn decode_calls() -> u64 {
    DECODE_CALLS.with(Cell::get)
}

pub(crate) fn from_str<T: DeserializeOwned>(input: &str) -> Result<T, simd_json::Error> {
    DECODE_CALLS.with(|calls| calls.set(calls.get() + 1));
    let mut bytes = input.as_bytes().to_vec();
    simd_json::serde::from_slice(&mut bytes)
}
