//! Provides simplified tokio lock types for sharing data between threads

mod atomic_rw;
mod shared;

pub use atomic_rw::AtomicRw;
pub use atomic_rw::AtomicRwReadGuard;
pub use atomic_rw::AtomicRwWriteGuard;
use shared::now;
pub use shared::LockAcquisition;
pub use shared::LockCallbackFn;
use shared::LockCallbackInfo;
pub use shared::LockEvent;
pub use shared::LockInfo;
pub use shared::LockType;
