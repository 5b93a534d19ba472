//! Purpose: Internal JSON decode boundary shared by scalar parsing and materialization.
//! Exports: `parse` module with the decode entrypoint and its per-thread call counter.
//! Role: Single seam for the decode primitive so callsites avoid ad hoc decode logic.
//! Invariants: All text-to-structure decoding in this crate goes through this module.
//! Invariants: Helper APIs stay small and deterministic (no hidden state beyond the counter).

pub(crate) mod parse;

pub use parse::decode_calls;
pub(crate) use parse::from_str;
