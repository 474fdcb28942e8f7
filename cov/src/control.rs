//! Control-plane entry points: open/close/init/map/enable/disable/
//! remote_enable, plus the remote_start/remote_stop pair bracketing a
//! remote-collection window.
//!
//! These are free functions over an opaque `CovHandle` rather than methods
//! on a VFS file object — wiring a character device's `open`/`ioctl`/`mmap`/
//! `release` onto these functions is the out-of-scope virtual-filesystem
//! plumbing named in §1. `cov_open` is the only entry point that manufactures
//! a `CovHandle`; every other entry point takes one by reference.

use alloc::sync::Arc;

use slopos_abi::cov::RemoteEnableArgs;
use slopos_abi::CovError;

use crate::descriptor::Descriptor;
use crate::{host, remote, task_state};

/// An open coverage session. Wraps the `Arc<Descriptor>` that realizes the
/// distilled design's hand-counted refcount (§3.1) — cloning a `CovHandle`
/// is the "+1" of an `open`-adjacent event, dropping one is the matching
/// "-1"; the descriptor frees its area and itself when the last clone (from
/// anywhere — a `CovHandle`, a task's attachment, or a remote registry
/// upgrade) is dropped.
pub struct CovHandle(pub(crate) Arc<Descriptor>);

impl Clone for CovHandle {
    fn clone(&self) -> Self {
        CovHandle(Arc::clone(&self.0))
    }
}

/// `open`: +1 refcount (the initial `Arc::new`), descriptor starts `DISABLED`.
pub fn cov_open() -> CovHandle {
    CovHandle(Descriptor::new())
}

/// `close`: -1 refcount. Dropping the returned value runs `Descriptor::drop`
/// if this was the last reference.
pub fn cov_close(handle: CovHandle) {
    drop(handle);
}

pub fn cov_init(handle: &CovHandle, size: usize) -> Result<(), CovError> {
    handle.0.init(size)
}

pub fn cov_map(handle: &CovHandle, len: usize) -> Result<(), CovError> {
    handle.0.map(len)
}

/// Pointer/length of the descriptor's mapped area, for the (out-of-scope)
/// VFS `mmap` integration to publish into the calling task's address space.
pub fn cov_buffer(handle: &CovHandle) -> Option<(*mut u8, usize)> {
    let inner = handle.0.inner.lock();
    inner.area.as_ref().map(|a| (a.as_ptr(), a.byte_len()))
}

pub fn cov_enable(handle: &CovHandle, trace_mode: u32) -> Result<(), CovError> {
    let task_id = host::current_task_id().ok_or(CovError::InvalidArgument)?;
    handle.0.enable(trace_mode, task_id)
}

pub fn cov_disable(handle: &CovHandle) -> Result<(), CovError> {
    let task_id = host::current_task_id().ok_or(CovError::InvalidArgument)?;
    handle.0.disable(task_id)
}

pub fn cov_remote_enable(handle: &CovHandle, args: &RemoteEnableArgs) -> Result<(), CovError> {
    let task_id = host::current_task_id().ok_or(CovError::InvalidArgument)?;
    handle.0.remote_enable(args, task_id)
}

/// `remote_start(handle)`: called by a background executor beginning work
/// attributable to `handle`. Fails silently (§4.3/§7) on every precondition:
/// no task context, already attached, unknown handle, or allocation failure.
pub fn remote_start(handle: u64) {
    if !host::in_task_context() {
        return;
    }
    let Some(task_id) = host::current_task_id() else {
        return;
    };
    if task_state::is_attached(task_id) {
        return;
    }
    let Some((descriptor, remote_size, mode, sequence)) = remote::lookup_for_start(handle) else {
        return;
    };
    let Ok(scratch) = remote::take_scratch(remote_size) else {
        // descriptor (the Arc from lookup_for_start) is dropped here,
        // releasing the refcount acquired by the successful upgrade.
        return;
    };
    scratch.write_count(0);
    let ptr = scratch.as_ptr();
    let words = scratch.word_count();
    task_state::attach(task_id, descriptor, mode, ptr, words, sequence, Some(scratch));
}

/// `remote_stop()`: the matching release for `remote_start`. No-op if the
/// calling task is not currently attached.
pub fn remote_stop() {
    let Some(task_id) = host::current_task_id() else {
        return;
    };
    let Some((descriptor, snapshot_sequence, scratch)) = task_state::detach(task_id) else {
        return;
    };
    if let Some(scratch) = scratch {
        descriptor.merge_if_valid(snapshot_sequence, &scratch);
        remote::return_scratch(scratch);
    }
    // descriptor (an Arc<Descriptor> local) drops here: the "-1" matching
    // remote_start's acquired refcount.
}
