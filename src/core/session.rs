//! Purpose: Encode-session lifecycle and sigil issuing for deferred splice-through.
//! Exports: `SigilRegistry`, `EncodeScope`, `issue_sigil`, sigil prefix constants.
//! Role: Thread-local session slot with strict save/restore nesting per encode call.
//! Invariants: One registry per top-level encode call; never shared across calls.
//! Invariants: Dropping a scope restores the previous session even on unwind.
//! Invariants: Sigil ids are dense and assigned monotonically from zero.

use std::cell::RefCell;

use tracing::trace;

pub(crate) const SIGIL_PREFIX: &str = "__djsp";
pub(crate) const QUOTED_SIGIL_PREFIX: &str = "\"__djsp";

/// Maps sigil ids to the raw text they stand in for. Ids are vector
/// indexes, so the monotonic counter is the vector length. Issuing the
/// same raw text twice yields two independent entries on purpose: each
/// occurrence in the encoder output is spliced on its own.
#[derive(Debug, Default)]
pub(crate) struct SigilRegistry {
    snippets: Vec<String>,
}

impl SigilRegistry {
    pub(crate) fn issue(&mut self, raw: &str) -> String {
        let id = self.snippets.len();
        self.snippets.push(raw.to_string());
        format!("{SIGIL_PREFIX}{id}")
    }

    pub(crate) fn get(&self, id: usize) -> Option<&str> {
        self.snippets.get(id).map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.snippets.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<SigilRegistry>> = const { RefCell::new(None) };
}

/// Issues a sigil from the active session, if one is open on this thread.
/// Returns `None` outside an encode call, which tells the caller to fall
/// back to materialized encoding.
pub(crate) fn issue_sigil(raw: &str) -> Option<String> {
    ACTIVE.with(|slot| slot.borrow_mut().as_mut().map(|registry| registry.issue(raw)))
}

/// RAII handle for one encode call's session. `open` swaps a fresh
/// registry into the thread slot and saves whatever was there; `close`
/// (or drop, on unwind) puts the saved session back.
pub(crate) struct EncodeScope {
    saved: Option<Option<SigilRegistry>>,
}

impl EncodeScope {
    pub(crate) fn open() -> Self {
        let saved = ACTIVE.with(|slot| slot.replace(Some(SigilRegistry::default())));
        trace!(nested = saved.is_some(), "opened encode session");
        Self { saved: Some(saved) }
    }

    /// Restores the saved session and hands back the registry populated
    /// during this encode call.
    pub(crate) fn close(mut self) -> SigilRegistry {
        let saved = self.saved.take().unwrap_or(None);
        let registry = ACTIVE.with(|slot| slot.replace(saved));
        registry.unwrap_or_default()
    }
}

impl Drop for EncodeScope {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            ACTIVE.with(|slot| {
                *slot.borrow_mut() = saved;
            });
        }
    }
}
