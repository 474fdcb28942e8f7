//! Task-exit integration: when any task terminates holding a descriptor
//! back-reference, its session must be torn down so the refcount it holds is
//! released and the descriptor doesn't outlive every task that could ever
//! disable it (§4.5).
//!
//! Wired in at boot through `slopos_abi::sched_traits::TaskCleanupHook`, the
//! same trait `video` already implements to clean up surfaces on task exit —
//! `cov` does not depend on `core`'s scheduler, so it cannot call
//! `register_cleanup_hook` itself; a concrete call site belongs at the
//! kernel's boot sequence, alongside `register_video_task_cleanup_callback`.

use slopos_abi::sched_traits::TaskCleanupHook;

use crate::task_state;

/// The coverage facility's task-cleanup hook. A single static instance is
/// exposed as [`CLEANUP_HOOK`] for boot code to register.
pub struct CovCleanupHook;

impl TaskCleanupHook for CovCleanupHook {
    fn on_task_terminate(&self, task_id: u32) {
        if let Some(descriptor) = task_state::peek_descriptor(task_id) {
            // warn_on_mismatch=true: an exiting task is not always the
            // descriptor's recorded owner (it may be a remote executor that
            // crashed mid remote_start), and that mismatch is itself the
            // invariant violation §7 asks us to log.
            descriptor.teardown(task_id, true);
        }
    }
}

pub static CLEANUP_HOOK: CovCleanupHook = CovCleanupHook;
