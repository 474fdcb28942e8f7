//! Kernel-side code-coverage collection facility.
//!
//! Gives a coverage-guided fuzzer driving this kernel a way to ask for raw
//! PC/CMP traces out of instrumented code, either for the calling task's own
//! execution (`enable`) or for work done on its behalf by other tasks it
//! does not control directly (`remote_enable`/`remote_start`/`remote_stop`).
//! Modeled on Linux's `kcov`.
//!
//! Layered like `mm::shared_memory` and `core::scheduler`: `area` owns the
//! raw shared buffer, `descriptor` is the per-session state machine,
//! `task_state` is the fast-path table trace sinks consult with no locking,
//! `remote` is the cross-task handle registry, `merge` folds a remote
//! window's scratch buffer into its destination, `control` is the external
//! entry-point surface, and `lifecycle`/`host` are this crate's two seams
//! into a scheduler it does not depend on.

#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

extern crate alloc;

mod area;
pub mod control;
mod descriptor;
pub mod host;
pub mod lifecycle;
mod merge;
mod remote;
pub mod sinks;
mod task_state;
pub mod tests;

pub use control::{
    CovHandle, cov_buffer, cov_close, cov_disable, cov_enable, cov_init, cov_map, cov_open,
    cov_remote_enable, remote_start, remote_stop,
};
pub use descriptor::DescMode;
pub use host::register_host;
pub use tests::run_cov_validation_tests;
