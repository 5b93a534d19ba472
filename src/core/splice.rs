//! Purpose: Post-process encoder output by replacing quoted sigils with raw text.
//! Exports: `splice`.
//! Role: Final pass of a top-level encode call when the session issued sigils.
//! Invariants: Non-sigil content is copied through byte-for-byte.
//! Invariants: A quoted token the registry cannot resolve is an internal contract failure.
//! Invariants: Every registry entry must appear in the output at least once.
//! Notes: Payload strings that themselves start with the sigil prefix are a known
//! limitation; they surface as `Internal` errors instead of corrupted output.

use tracing::trace;

use crate::core::error::{Error, ErrorKind};
use crate::core::session::{QUOTED_SIGIL_PREFIX, SigilRegistry};

/// Replaces each quoted sigil token (opening quote, prefix, digits,
/// closing quote) with the registered raw text, unquoted. The encoder
/// emitted the sigil as an ordinary string, so the token boundaries are
/// exactly one JSON string literal wide.
pub(crate) fn splice(encoded: &str, registry: &SigilRegistry) -> Result<String, Error> {
    let mut out = String::with_capacity(encoded.len());
    let mut seen = vec![false; registry.len()];
    let mut rest = encoded;
    let mut consumed = 0usize;

    while let Some(at) = rest.find(QUOTED_SIGIL_PREFIX) {
        out.push_str(&rest[..at]);
        let token_offset = (consumed + at) as u64;
        let tail = &rest[at + QUOTED_SIGIL_PREFIX.len()..];
        let digits = tail.bytes().take_while(|byte| byte.is_ascii_digit()).count();
        if digits == 0 || tail.as_bytes().get(digits) != Some(&b'"') {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("sigil token was altered in encoder output")
                .with_offset(token_offset));
        }
        let id: usize = tail[..digits].parse().map_err(|_| {
            Error::new(ErrorKind::Internal)
                .with_message("sigil id does not fit an index")
                .with_offset(token_offset)
        })?;
        let raw = registry.get(id).ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("sigil id {id} missing from the session registry"))
                .with_offset(token_offset)
        })?;
        out.push_str(raw);
        if let Some(flag) = seen.get_mut(id) {
            *flag = true;
        }
        let advance = at + QUOTED_SIGIL_PREFIX.len() + digits + 1;
        consumed += advance;
        rest = &rest[advance..];
    }
    out.push_str(rest);

    if let Some(missing) = seen.iter().position(|found| !found) {
        return Err(Error::new(ErrorKind::Internal)
            .with_message(format!("sigil id {missing} never appeared in encoder output")));
    }
    trace!(spliced = registry.len(), "spliced deferred raw text");
    Ok(out)
}
