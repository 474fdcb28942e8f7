//! Per-task coverage state: the fixed-size slot table trace sinks consult on
//! every instrumented call.
//!
//! Sized to `slopos_abi::cov::MAX_COV_TASKS` (mirrors `MAX_TASKS`), following
//! the fixed-array-of-slots shape `SharedBufferRegistry` already uses — there
//! is no dynamic per-task allocation anywhere in this kernel.
//!
//! Each slot carries two kinds of state: lock-free atomics (`mode`,
//! `area_ptr`, `area_words`) that trace sinks read on the fast path with no
//! locking at all, and a lock-guarded descriptor back-reference used only on
//! the attach/detach/merge paths (enable, disable, remote_start, remote_stop,
//! task-exit teardown) — never touched by a sink.

use alloc::sync::Arc;
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU8, AtomicUsize, Ordering};

use slopos_abi::cov::MAX_COV_TASKS;
use slopos_lib::IrqMutex;

use crate::area::CovArea;
use crate::descriptor::Descriptor;

pub const TASK_MODE_DISABLED: u8 = 0;
pub const TASK_MODE_TRACE_PC: u8 = 1;
pub const TASK_MODE_TRACE_CMP: u8 = 2;

/// Snapshot taken at attach time, released at detach time. `scratch` is
/// `Some` only for a `remote_start` attachment — the executor task owns the
/// scratch buffer for the duration of its window; an owner-`enable`
/// attachment's buffer belongs to the descriptor instead, so `scratch` is
/// `None` there.
struct Attachment {
    descriptor: Arc<Descriptor>,
    sequence: u64,
    scratch: Option<CovArea>,
}

struct CovTaskSlot {
    mode: AtomicU8,
    area_ptr: AtomicPtr<u8>,
    area_words: AtomicUsize,
    attachment: IrqMutex<Option<Attachment>>,
}

impl CovTaskSlot {
    const fn empty() -> Self {
        Self {
            mode: AtomicU8::new(TASK_MODE_DISABLED),
            area_ptr: AtomicPtr::new(ptr::null_mut()),
            area_words: AtomicUsize::new(0),
            attachment: IrqMutex::new(None),
        }
    }
}

static SLOTS: [CovTaskSlot; MAX_COV_TASKS] = [const { CovTaskSlot::empty() }; MAX_COV_TASKS];

fn slot(task_id: u32) -> Option<&'static CovTaskSlot> {
    SLOTS.get(task_id as usize)
}

/// Lock-free read used by the trace sinks: mode, buffer base pointer, and
/// capacity in words. `mode` is loaded with acquire ordering per §5 — a sink
/// observing a non-`DISABLED` mode also observes the matching buffer fields.
pub fn read_fast(task_id: u32) -> Option<(u8, *mut u8, usize)> {
    let slot = slot(task_id)?;
    let mode = slot.mode.load(Ordering::Acquire);
    if mode == TASK_MODE_DISABLED {
        return None;
    }
    let ptr = slot.area_ptr.load(Ordering::Relaxed);
    let words = slot.area_words.load(Ordering::Relaxed);
    Some((mode, ptr, words))
}

/// True if `task_id` is currently attached to any descriptor. Used to
/// enforce "a task may be attached to at most one descriptor" on both the
/// owner-enable and remote-start paths.
pub fn is_attached(task_id: u32) -> bool {
    match slot(task_id) {
        Some(slot) => slot.attachment.lock().is_some(),
        None => true, // an out-of-range task id can never attach; treat as busy
    }
}

/// Attach `descriptor` to `task_id`, publishing buffer pointers before mode
/// (release ordering), per the enable/remote_start publication rule. Returns
/// false if the slot is out of range or already attached — callers are
/// expected to have already checked `is_attached`, this is the authoritative
/// compare-and-attach step taken under the slot's own lock.
pub fn attach(
    task_id: u32,
    descriptor: Arc<Descriptor>,
    mode: u8,
    area_ptr: *mut u8,
    area_words: usize,
    sequence: u64,
    scratch: Option<CovArea>,
) -> bool {
    let Some(slot) = slot(task_id) else {
        return false;
    };
    let mut guard = slot.attachment.lock();
    if guard.is_some() {
        return false;
    }
    *guard = Some(Attachment {
        descriptor,
        sequence,
        scratch,
    });
    slot.area_ptr.store(area_ptr, Ordering::Relaxed);
    slot.area_words.store(area_words, Ordering::Relaxed);
    slot.mode.store(mode, Ordering::Release);
    true
}

/// Clone the descriptor `task_id` is currently attached to, without
/// detaching. Used by the task-exit hook, which needs a handle on the
/// descriptor to run its own teardown (which itself calls `detach`).
pub fn peek_descriptor(task_id: u32) -> Option<Arc<Descriptor>> {
    let slot = slot(task_id)?;
    let guard = slot.attachment.lock();
    guard.as_ref().map(|a| Arc::clone(&a.descriptor))
}

/// Detach `task_id`, clearing mode first and buffer pointers after (release
/// ordering, reversed from attach), then handing back the descriptor, the
/// sequence number snapshotted at attach time, and the scratch buffer (if
/// this was a remote attachment) so the caller can decide whether a remote
/// window's data is still valid and reclaim the scratch buffer.
pub fn detach(task_id: u32) -> Option<(Arc<Descriptor>, u64, Option<CovArea>)> {
    let slot = slot(task_id)?;
    slot.mode.store(TASK_MODE_DISABLED, Ordering::Release);
    slot.area_ptr.store(ptr::null_mut(), Ordering::Relaxed);
    slot.area_words.store(0, Ordering::Relaxed);
    let mut guard = slot.attachment.lock();
    guard
        .take()
        .map(|a| (a.descriptor, a.sequence, a.scratch))
}
