use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tokio::sync::RwLockReadGuard;
use tokio::sync::RwLockWriteGuard;

use super::now;
use super::LockAcquisition;
use super::LockCallbackFn;
use super::LockCallbackInfo;
use super::LockEvent;
use super::LockType;

/// An `Arc<RwLock<T>>` wrapper to make data thread-safe and easy to work with.
///
/// # Examples
/// ```
/// # use walletforge::application::locks::tokio::AtomicRw;
/// struct Counter {
///     hits: u16,
/// };
/// # tokio_test::block_on(async {
/// let atomic_counter = AtomicRw::from(Counter { hits: 0 });
/// atomic_counter.lock_mut(|c| c.hits += 1).await;
/// assert_eq!(atomic_counter.lock(|c| c.hits).await, 1);
/// # })
/// ```
///
/// A name and callback fn may be provided during instantiation so that the
/// application can trace lock acquisitions and releases.
#[derive(Debug)]
pub struct AtomicRw<T> {
    inner: Arc<RwLock<T>>,
    lock_callback_info: LockCallbackInfo,
}

impl<T: Default> Default for AtomicRw<T> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
            lock_callback_info: LockCallbackInfo::new(LockType::RwLock, None, None),
        }
    }
}

impl<T> From<T> for AtomicRw<T> {
    #[inline]
    fn from(t: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(t)),
            lock_callback_info: LockCallbackInfo::new(LockType::RwLock, None, None),
        }
    }
}

impl<T> From<(T, Option<&str>, Option<LockCallbackFn>)> for AtomicRw<T> {
    /// Create from a name ref and an optional callback function, which
    /// is called when a lock event occurs.
    #[inline]
    fn from(v: (T, Option<&str>, Option<LockCallbackFn>)) -> Self {
        Self {
            inner: Arc::new(RwLock::new(v.0)),
            lock_callback_info: LockCallbackInfo::new(
                LockType::RwLock,
                v.1.map(|s| s.to_owned()),
                v.2,
            ),
        }
    }
}

impl<T> Clone for AtomicRw<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            lock_callback_info: self.lock_callback_info.clone(),
        }
    }
}

impl<T> AtomicRw<T> {
    /// Acquire read lock and return an `AtomicRwReadGuard`
    pub async fn lock_guard(&self) -> AtomicRwReadGuard<'_, T> {
        self.try_acquire_cb(LockAcquisition::Read);

        let try_acquire_at = now();
        let guard = self.inner.read().await;
        AtomicRwReadGuard::new(guard, &self.lock_callback_info, try_acquire_at)
    }

    /// Acquire write lock and return an `AtomicRwWriteGuard`
    ///
    /// Takes `&self`: the store types hand out shared references to their
    /// keyspace and serialize writers here.
    pub async fn lock_guard_mut(&self) -> AtomicRwWriteGuard<'_, T> {
        self.try_acquire_cb(LockAcquisition::Write);

        let try_acquire_at = now();
        let guard = self.inner.write().await;
        AtomicRwWriteGuard::new(guard, &self.lock_callback_info, try_acquire_at)
    }

    /// Immutably access the data of type `T` in a closure and possibly return a result of type `R`
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.lock_guard().await;
        f(&guard)
    }

    /// Mutably access the data of type `T` in a closure and possibly return a result of type `R`
    pub async fn lock_mut<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.lock_guard_mut().await;
        f(&mut guard)
    }

    /// retrieve lock name if present, or None
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.lock_callback_info.lock_info_owned.name.as_deref()
    }

    fn try_acquire_cb(&self, acquisition: LockAcquisition) {
        self.lock_callback_info.emit(LockEvent::TryAcquire {
            info: self.lock_callback_info.lock_info_owned.as_lock_info(),
            acquisition,
        });
    }
}

/// A wrapper for [RwLockReadGuard] that can optionally call a callback fn
/// when lock is acquired and released.
#[derive(Debug)]
pub struct AtomicRwReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    lock_callback_info: &'a LockCallbackInfo,
    try_acquire_at: Instant,
    acquire_at: Instant,
}

impl<'a, T> AtomicRwReadGuard<'a, T> {
    fn new(
        guard: RwLockReadGuard<'a, T>,
        lock_callback_info: &'a LockCallbackInfo,
        try_acquire_at: Instant,
    ) -> Self {
        let acquire_at = now();
        lock_callback_info.emit(LockEvent::Acquire {
            info: lock_callback_info.lock_info_owned.as_lock_info(),
            acquisition: LockAcquisition::Read,
            try_acquire_at,
            acquire_at,
        });
        Self {
            guard,
            lock_callback_info,
            try_acquire_at,
            acquire_at,
        }
    }
}

impl<T> Drop for AtomicRwReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock_callback_info.emit(LockEvent::Release {
            info: self.lock_callback_info.lock_info_owned.as_lock_info(),
            acquisition: LockAcquisition::Read,
            try_acquire_at: self.try_acquire_at,
            acquire_at: self.acquire_at,
        });
    }
}

impl<T> Deref for AtomicRwReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// A wrapper for [RwLockWriteGuard] that can optionally call a callback fn
/// when lock is acquired or released
#[derive(Debug)]
pub struct AtomicRwWriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    lock_callback_info: &'a LockCallbackInfo,
    try_acquire_at: Instant,
    acquire_at: Instant,
}

impl<'a, T> AtomicRwWriteGuard<'a, T> {
    fn new(
        guard: RwLockWriteGuard<'a, T>,
        lock_callback_info: &'a LockCallbackInfo,
        try_acquire_at: Instant,
    ) -> Self {
        let acquire_at = now();
        lock_callback_info.emit(LockEvent::Acquire {
            info: lock_callback_info.lock_info_owned.as_lock_info(),
            acquisition: LockAcquisition::Write,
            try_acquire_at,
            acquire_at,
        });
        Self {
            guard,
            lock_callback_info,
            try_acquire_at,
            acquire_at,
        }
    }
}

impl<T> Drop for AtomicRwWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock_callback_info.emit(LockEvent::Release {
            info: self.lock_callback_info.lock_info_owned.as_lock_info(),
            acquisition: LockAcquisition::Write,
            try_acquire_at: self.try_acquire_at,
            acquire_at: self.acquire_at,
        });
    }
}

impl<T> Deref for AtomicRwWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for AtomicRwWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
