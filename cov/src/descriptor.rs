//! The per-session coverage descriptor and its state machine.
//!
//! ```text
//! DISABLED --init(size)-->        INIT
//! INIT     --map(len)-->          INIT   (area attached, at most once)
//! INIT     --enable(mode)-->      TRACE_PC | TRACE_CMP
//! INIT     --remote_enable(..)--> TRACE_PC | TRACE_CMP  (remote = true)
//! TRACE_*  --disable()-->         INIT
//! any      --close()-->           freed when the last Arc clone is dropped
//! ```
//!
//! The hand-counted refcount of the distilled design is realized here as
//! `Arc<Descriptor>`'s own strong count, the same redesign `core::scheduler`
//! already applies to task lifetime (`TaskRef = Arc<TaskLock>`): `open` is
//! the initial `Arc::new`, `enable`/`remote_enable`/`remote_start` each clone
//! it, and `disable`/`remote_stop`/`close` each drop a clone. The final drop
//! runs `Descriptor`'s own `Drop` impl, which frees the area.

use alloc::sync::Arc;
use alloc::vec::Vec;

use slopos_abi::CovError;
use slopos_lib::{IrqMutex, klog_warn};

use crate::area::CovArea;
use crate::remote;
use crate::task_state::{self, TASK_MODE_DISABLED, TASK_MODE_TRACE_CMP, TASK_MODE_TRACE_PC};

/// Descriptor-level mode. Distinct from the per-task fast-path mode in
/// `task_state`: this one also carries `Init`, which a task never observes
/// directly (a task is only ever attached while the descriptor is tracing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescMode {
    Disabled,
    Init,
    TracePc,
    TraceCmp,
}

pub(crate) struct DescriptorInner {
    pub mode: DescMode,
    pub size: usize,
    pub area: Option<CovArea>,
    pub mapped: bool,
    pub owner_task: Option<u32>,
    pub remote: bool,
    pub remote_size: usize,
    pub sequence: u64,
    /// Handles this descriptor has registered in the remote registry, so
    /// `disable`/teardown can purge exactly its own entries (§4.5.1).
    pub handles: Vec<u64>,
}

impl DescriptorInner {
    const fn new() -> Self {
        Self {
            mode: DescMode::Disabled,
            size: 0,
            area: None,
            mapped: false,
            owner_task: None,
            remote: false,
            remote_size: 0,
            sequence: 0,
            handles: Vec::new(),
        }
    }
}

/// A coverage session. Always accessed behind `Arc<Descriptor>` (see
/// `CovHandle` in `control.rs`); the lock inside serializes every
/// state-machine transition and the merge operation, per §5's lock-order
/// rule: whenever code holds both locks at once, the descriptor lock is
/// acquired before the registry lock, never the reverse. `remote::
/// lookup_for_start` avoids the problem entirely by never holding both at
/// the same time.
pub struct Descriptor {
    pub(crate) inner: IrqMutex<DescriptorInner>,
}

impl Descriptor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: IrqMutex::new(DescriptorInner::new()),
        })
    }

    /// `DISABLED --init(size)--> INIT`
    pub fn init(&self, size: usize) -> Result<(), CovError> {
        use slopos_abi::cov::{COV_MAX_AREA_WORDS, COV_MIN_AREA_WORDS};

        if !(COV_MIN_AREA_WORDS..=COV_MAX_AREA_WORDS).contains(&size) {
            return Err(CovError::InvalidArgument);
        }
        let mut inner = self.inner.lock();
        if inner.mode != DescMode::Disabled {
            return Err(CovError::Busy);
        }
        inner.size = size;
        inner.mode = DescMode::Init;
        Ok(())
    }

    /// `INIT --map(len)--> INIT`. Accepts only the first successful mapping;
    /// later calls allocate-then-discard a candidate region and return
    /// success regardless, matching the observed (if unresolved — §9)
    /// behavior of idempotent-looking repeated MAP calls.
    pub fn map(&self, len: usize) -> Result<(), CovError> {
        let mut inner = self.inner.lock();
        if inner.mode != DescMode::Init {
            return Err(CovError::InvalidArgument);
        }
        let expected = inner
            .size
            .checked_mul(8)
            .ok_or(CovError::InvalidArgument)?;
        if len != expected {
            return Err(CovError::InvalidArgument);
        }
        let candidate = CovArea::new(inner.size)?;
        if inner.mapped {
            // A region was already attached; discard the freshly allocated
            // one (dropped here) and report success unconditionally.
            return Ok(());
        }
        inner.area = Some(candidate);
        inner.mapped = true;
        Ok(())
    }

    /// `INIT --enable(mode)--> TRACE_PC | TRACE_CMP`
    pub fn enable(self: &Arc<Self>, requested_mode: u32, task_id: u32) -> Result<(), CovError> {
        self.enable_inner(requested_mode, task_id, None)
    }

    /// `enable` plus handle registration. Rolls back entirely (handles
    /// purged, descriptor left in `Init`) on duplicate handle or allocation
    /// failure, per §4.1's compound-rollback rule.
    pub fn remote_enable(
        self: &Arc<Self>,
        args: &slopos_abi::cov::RemoteEnableArgs,
        task_id: u32,
    ) -> Result<(), CovError> {
        if args.handle_count as usize > slopos_abi::cov::MAX_HANDLES {
            return Err(CovError::InvalidArgument);
        }
        let handles = &args.handles[..args.handle_count as usize];
        self.enable_inner(
            args.trace_mode,
            task_id,
            Some((handles, args.area_size as usize)),
        )
    }

    fn enable_inner(
        self: &Arc<Self>,
        requested_mode: u32,
        task_id: u32,
        remote_handles: Option<(&[u64], usize)>,
    ) -> Result<(), CovError> {
        use slopos_abi::cov::{COV_TRACE_CMP, COV_TRACE_PC};

        if task_state::is_attached(task_id) {
            return Err(CovError::Busy);
        }
        let task_mode = match requested_mode {
            m if m == COV_TRACE_PC => TASK_MODE_TRACE_PC,
            m if m == COV_TRACE_CMP => TASK_MODE_TRACE_CMP,
            _ => return Err(CovError::InvalidArgument),
        };

        let mut inner = self.inner.lock();
        if inner.mode != DescMode::Init || inner.owner_task.is_some() {
            return Err(if inner.owner_task.is_some() {
                CovError::Busy
            } else {
                CovError::InvalidArgument
            });
        }
        let area_ref = inner.area.as_ref().ok_or(CovError::InvalidArgument)?;
        let (area_ptr, area_words) = (area_ref.as_ptr(), area_ref.word_count());

        let is_remote = remote_handles.is_some();
        if let Some((handles, remote_size)) = remote_handles {
            remote::register_handles(handles, self)?;
            inner.handles.extend_from_slice(handles);
            inner.remote = true;
            inner.remote_size = remote_size;
        }

        inner.mode = if task_mode == TASK_MODE_TRACE_PC {
            DescMode::TracePc
        } else {
            DescMode::TraceCmp
        };
        inner.owner_task = Some(task_id);
        drop(inner);

        // This Arc::clone is the "+1 per enabled task" refcount event from §4.5.
        // scratch=None: the owner's buffer belongs to the descriptor, not the
        // attachment (unlike a remote_start attachment's scratch buffer).
        //
        // In the remote case the owner is attached (so is_attached/teardown/
        // refcount all see it) but published as TASK_MODE_DISABLED: per §4.1,
        // the owner "will not itself feed coverage — only remote executors
        // claiming those handles will."
        let published_mode = if is_remote { TASK_MODE_DISABLED } else { task_mode };
        task_state::attach(
            task_id,
            Arc::clone(self),
            published_mode,
            area_ptr,
            area_words,
            0,
            None,
        );
        Ok(())
    }

    /// `TRACE_* --disable()--> INIT`. Shares its teardown with the task-exit
    /// hook (§4.5.1): both call `teardown_locked`.
    pub fn disable(self: &Arc<Self>, task_id: u32) -> Result<(), CovError> {
        let owner = { self.inner.lock().owner_task };
        if owner != Some(task_id) {
            return Err(CovError::InvalidArgument);
        }
        self.teardown(task_id, false);
        Ok(())
    }

    /// Shared teardown path for `disable()` and task-exit. Resets the
    /// descriptor to `INIT`, purges this descriptor's own registered
    /// handles when `remote` is set, bumps `sequence`, and releases the
    /// attachment's refcount. `warn_on_mismatch` additionally logs a
    /// one-shot warning if the exiting task was not the recorded owner
    /// (task-exit only — `disable` already validated the owner above).
    pub(crate) fn teardown(self: &Arc<Self>, task_id: u32, warn_on_mismatch: bool) {
        let mut inner = self.inner.lock();
        if warn_on_mismatch && inner.owner_task != Some(task_id) {
            klog_warn!("cov: task {} exited while not the recorded owner", task_id);
        }
        if inner.remote && !inner.handles.is_empty() {
            remote::purge_handles(&inner.handles);
            inner.handles.clear();
        }
        inner.mode = DescMode::Init;
        inner.owner_task = None;
        inner.remote = false;
        inner.remote_size = 0;
        inner.sequence = inner.sequence.wrapping_add(1);
        drop(inner);

        // Detach drops the Arc clone task_state::attach made in enable_inner
        // / attach_remote, releasing the matching refcount.
        task_state::detach(task_id);
    }

    pub fn sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    /// Snapshot taken by `remote_start` under this descriptor's own lock,
    /// after the registry lock has already been released (`remote::
    /// lookup_for_start`) — the linearization point that races with
    /// `disable` (§5). Returns `None` if the descriptor is not currently
    /// tracing (e.g. it was torn down between the registry lookup and this
    /// call).
    pub(crate) fn snapshot_for_remote_start(&self) -> Option<(u8, usize, u64)> {
        let inner = self.inner.lock();
        let mode = match inner.mode {
            DescMode::TracePc => TASK_MODE_TRACE_PC,
            DescMode::TraceCmp => TASK_MODE_TRACE_CMP,
            _ => return None,
        };
        Some((mode, inner.remote_size, inner.sequence))
    }

    /// `remote_stop`'s merge decision: under the descriptor lock, merge the
    /// scratch buffer iff the snapshotted sequence still matches and the
    /// descriptor is still a remote one; otherwise the window was
    /// invalidated mid-flight and its records are dropped silently (§4.3/§7).
    pub(crate) fn merge_if_valid(&self, snapshot_sequence: u64, scratch: &CovArea) {
        let inner = self.inner.lock();
        if inner.sequence != snapshot_sequence || !inner.remote {
            return;
        }
        if let Some(area) = inner.area.as_ref() {
            crate::merge::merge(inner.mode, area, scratch);
        }
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        // Final decrement: free the area (CovArea's own Drop does this) and
        // run the defensive registry scan described as a "safety net" in
        // §4.5 — normal teardown already purged this descriptor's own
        // handles, so this is expected to find nothing outside of bugs.
        remote::purge_dangling();
    }
}
