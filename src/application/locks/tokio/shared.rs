use std::time::Instant;

pub(super) fn now() -> Instant {
    Instant::now()
}

/// Indicates the lock's underlying type
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LockType {
    RwLock,
}

/// Indicates how a lock was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LockAcquisition {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub(super) struct LockInfoOwned {
    pub name: Option<String>,
    pub lock_type: LockType,
}

impl LockInfoOwned {
    #[inline]
    pub fn as_lock_info(&self) -> LockInfo<'_> {
        LockInfo {
            name: self.name.as_deref(),
            lock_type: self.lock_type,
        }
    }
}

/// Contains metadata about a lock
#[derive(Debug, Clone, Copy)]
pub struct LockInfo<'a> {
    name: Option<&'a str>,
    lock_type: LockType,
}

impl LockInfo<'_> {
    /// get the lock's name
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name
    }

    /// get the lock's type
    #[inline]
    pub fn lock_type(&self) -> LockType {
        self.lock_type
    }
}

#[derive(Debug, Clone)]
pub(super) struct LockCallbackInfo {
    pub lock_info_owned: LockInfoOwned,
    pub lock_callback_fn: Option<LockCallbackFn>,
}

impl LockCallbackInfo {
    #[inline]
    pub fn new(
        lock_type: LockType,
        name: Option<String>,
        lock_callback_fn: Option<LockCallbackFn>,
    ) -> Self {
        Self {
            lock_info_owned: LockInfoOwned { name, lock_type },
            lock_callback_fn,
        }
    }

    pub(super) fn emit(&self, event: LockEvent) {
        if let Some(cb) = self.lock_callback_fn {
            cb(event);
        }
    }
}

/// Represents an event (acquire/release) for a lock
#[derive(Debug, Clone)]
pub enum LockEvent<'a> {
    TryAcquire {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
    },
    Acquire {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
        try_acquire_at: Instant,
        acquire_at: Instant,
    },
    Release {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
        try_acquire_at: Instant,
        acquire_at: Instant,
    },
}

impl LockEvent<'_> {
    pub fn event_type_name(&self) -> &'static str {
        match self {
            Self::TryAcquire { .. } => "TryAcquire",
            Self::Acquire { .. } => "Acquire",
            Self::Release { .. } => "Release",
        }
    }

    pub fn info(&self) -> &LockInfo<'_> {
        match self {
            Self::TryAcquire { info, .. } => info,
            Self::Acquire { info, .. } => info,
            Self::Release { info, .. } => info,
        }
    }

    pub fn acquisition(&self) -> LockAcquisition {
        match self {
            Self::TryAcquire { acquisition, .. } => *acquisition,
            Self::Acquire { acquisition, .. } => *acquisition,
            Self::Release { acquisition, .. } => *acquisition,
        }
    }

    pub fn try_acquire_at(&self) -> Option<Instant> {
        match self {
            Self::TryAcquire { .. } => None,
            Self::Acquire { try_acquire_at, .. } => Some(*try_acquire_at),
            Self::Release { try_acquire_at, .. } => Some(*try_acquire_at),
        }
    }

    pub fn acquire_at(&self) -> Option<Instant> {
        match self {
            Self::TryAcquire { .. } => None,
            Self::Acquire { acquire_at, .. } => Some(*acquire_at),
            Self::Release { acquire_at, .. } => Some(*acquire_at),
        }
    }
}

/// A callback fn for receiving [`LockEvent`] event
/// each time a lock is acquired or released.
pub type LockCallbackFn = fn(lock_event: LockEvent);
