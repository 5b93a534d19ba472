//! Purpose: Deferred JSON decode/encode built on serde, with raw-text splice-through.
//! Exports: `parse`, `to_string`, `Parsed`, `DeferredValue`, error types, diagnostics.
//! Role: Library crate root; re-exports the public surface from `core` and `json`.
//! Invariants: Values passed through untouched re-encode without invoking the decoder.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod core;
pub(crate) mod json;

pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::stringify::to_string;
pub use crate::core::value::{DeferredValue, FieldDescriptor, Kind, Parsed, parse};
pub use crate::json::decode_calls;
