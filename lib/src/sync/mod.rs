mod level;
mod mutex;
mod rwlock;
mod token;

pub use level::{Level, Lower, L0, L1, L2, L3, L4, L5};
pub use mutex::{Mutex, MutexGuard};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use token::{CleanLockToken, LockToken};
