//! Remote-collection registry: a global `handle -> descriptor` map plus a
//! sized free-list of per-executor scratch buffers.
//!
//! The registry owns only weak back-references to descriptors — registering
//! a handle is not one of the refcount events §4.5 enumerates (only `open`,
//! `enable`/`remote_enable`, and `remote_start` are). `Weak::upgrade` is what
//! implements "acquire one refcount on the target descriptor" inside
//! `remote_start`: if the descriptor has already been fully torn down, the
//! upgrade fails and the window never starts.

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use slopos_abi::CovError;
use slopos_lib::IrqMutex;

use crate::area::CovArea;
use crate::descriptor::Descriptor;

struct Registry {
    handles: BTreeMap<u64, Weak<Descriptor>>,
    /// Free-list of scratch buffers, sized rather than pooled: a request for
    /// a size with no matching free entry falls through to a fresh
    /// allocation (§9). Entries are reclaimed only at facility teardown.
    free_scratch: Vec<CovArea>,
}

impl Registry {
    const fn new() -> Self {
        Self {
            handles: BTreeMap::new(),
            free_scratch: Vec::new(),
        }
    }
}

static REGISTRY: IrqMutex<Registry> = IrqMutex::new(Registry::new());

/// Insert `handles` for `descriptor` in one atomic-looking step: on any
/// duplicate, every handle already inserted by this call is removed before
/// returning `Exists`, per §4.1/§8's compound-rollback requirement.
///
/// Lock order: callers always hold the descriptor lock before this is
/// called (enable_inner locks first), never the reverse — this function
/// only ever touches the registry lock.
pub(crate) fn register_handles(handles: &[u64], descriptor: &Arc<Descriptor>) -> Result<(), CovError> {
    let mut registry = REGISTRY.lock();
    // Reject on overlap within the call itself, or against existing entries.
    for (i, &h) in handles.iter().enumerate() {
        if registry.handles.contains_key(&h) || handles[..i].contains(&h) {
            return Err(CovError::Exists);
        }
    }
    let weak = Arc::downgrade(descriptor);
    for &h in handles {
        registry.handles.insert(h, weak.clone());
    }
    Ok(())
}

/// Remove exactly the handles named, used by `disable`/teardown to purge a
/// descriptor's own entries (§4.5.1 — normal teardown purges on disable).
pub(crate) fn purge_handles(handles: &[u64]) {
    let mut registry = REGISTRY.lock();
    for h in handles {
        registry.handles.remove(h);
    }
}

/// Defensive full scan removing any entry whose descriptor has already been
/// dropped. Run from `Descriptor::drop` as the "safety net" described in
/// §4.5; normal teardown already removed the owning descriptor's entries, so
/// this is expected to find nothing outside of bugs.
pub(crate) fn purge_dangling() {
    let mut registry = REGISTRY.lock();
    registry.handles.retain(|_, weak| weak.strong_count() > 0);
}

/// `remote_start(handle)`: look up the handle and acquire one refcount on
/// the live descriptor under the registry lock, then release it before
/// snapshotting `(remote_size, task_mode, sequence)` under the descriptor's
/// own lock — the linearization point that races with `disable` (§5).
///
/// Lock order: this releases the registry lock before ever touching the
/// descriptor lock, so it never nests registry-then-descriptor. Nesting
/// that way here would invert `enable_inner`'s descriptor-then-registry
/// order (it holds the descriptor lock across `register_handles`) and open
/// an AB-BA deadlock between a concurrent `remote_enable` and `remote_start`
/// on the same descriptor.
pub(crate) fn lookup_for_start(handle: u64) -> Option<(Arc<Descriptor>, usize, u8, u64)> {
    let descriptor = {
        let registry = REGISTRY.lock();
        registry.handles.get(&handle)?.upgrade()?
    };
    let (mode, size, seq) = descriptor.snapshot_for_remote_start()?;
    Some((descriptor, size, mode, seq))
}

/// Pop a scratch buffer of exactly `words` capacity from the free-list, or
/// allocate a fresh one if none matches.
pub(crate) fn take_scratch(words: usize) -> Result<CovArea, CovError> {
    let mut registry = REGISTRY.lock();
    if let Some(pos) = registry
        .free_scratch
        .iter()
        .position(|a| a.word_count() == words)
    {
        return Ok(registry.free_scratch.swap_remove(pos));
    }
    drop(registry);
    CovArea::new(words)
}

/// Return a scratch buffer to the free-list under the registry lock.
pub(crate) fn return_scratch(area: CovArea) {
    REGISTRY.lock().free_scratch.push(area);
}
