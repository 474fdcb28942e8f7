//! Host-services bridge.
//!
//! `cov` cannot depend on `core`'s scheduler, so it asks for the three facts
//! it needs — current task identity, task-vs-interrupt context, and the ASLR
//! relocation offset — through `slopos_abi::sched_traits::CovHost`, wired in
//! at boot the same way `drivers::sched_bridge` wires `SchedulerExecution`
//! and `BootServices`.
//!
//! Until `register_host` has been called, every sink and remote-start call
//! treats the host as absent: `in_task_context` reads false, so the fast
//! paths no-op rather than panic, and a one-shot warning is logged the first
//! time this is observed.

use core::sync::atomic::{AtomicBool, Ordering};

use slopos_abi::sched_traits::CovHost;
use slopos_lib::klog_warn;
use spin::Once;

static HOST: Once<&'static dyn CovHost> = Once::new();
static WARNED_NO_HOST: AtomicBool = AtomicBool::new(false);

pub fn register_host(host: &'static dyn CovHost) {
    HOST.call_once(|| host);
}

fn host() -> Option<&'static dyn CovHost> {
    let h = HOST.get().copied();
    if h.is_none() && !WARNED_NO_HOST.swap(true, Ordering::Relaxed) {
        klog_warn!("cov: no CovHost registered, trace sinks are no-ops");
    }
    h
}

/// ID of the task currently running on this CPU, if any.
pub fn current_task_id() -> Option<u32> {
    host().and_then(|h| h.current_task_id())
}

/// Whether we are presently executing in a task's own context.
pub fn in_task_context() -> bool {
    host().is_some_and(|h| h.in_task_context())
}

/// Kernel image load offset used to canonicalize recorded PCs.
pub fn aslr_offset() -> u64 {
    host().map(|h| h.aslr_offset()).unwrap_or(0)
}
