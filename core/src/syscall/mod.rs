#[macro_use]
pub mod macros;
pub mod common;
pub mod context;
pub mod dispatch;
pub mod fs;
pub mod handlers;
pub mod tests;

pub use dispatch::syscall_handle;
pub use handlers::register_spawn_task_callback;
pub use tests::run_syscall_validation_tests;
