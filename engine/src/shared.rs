//! Thread-safe handle around a [`LifecycleCoordinator`].
//!
//! Mutating calls take the write lock and run to completion one at a time.
//! Queries take the read lock and only ever observe committed state.
//! A poisoned lock is recovered with a warning.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::coordinator::LifecycleCoordinator;
use crate::error::EngineError;
use crate::surface::{self, Operation};

#[derive(Debug, Clone)]
pub struct SharedCoordinator {
    inner: Arc<RwLock<LifecycleCoordinator>>,
}

impl SharedCoordinator {
    #[must_use]
    pub fn new(coordinator: LifecycleCoordinator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(coordinator)),
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, LifecycleCoordinator> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered poisoned coordinator lock (read)");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, LifecycleCoordinator> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered poisoned coordinator lock (write)");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Run `f` with shared access.
    pub fn read<R>(&self, f: impl FnOnce(&LifecycleCoordinator) -> R) -> R {
        f(&self.read_guard())
    }

    /// Run `f` with exclusive access.
    pub fn write<R>(&self, f: impl FnOnce(&mut LifecycleCoordinator) -> R) -> R {
        f(&mut self.write_guard())
    }

    /// Dispatch through the operation surface, taking only the read lock
    /// for query operations.
    pub fn invoke(&self, op: Operation, args: &Map<String, Value>) -> Result<Value, EngineError> {
        if op.is_query() {
            self.read(|coordinator| surface::query(coordinator, op, args))
        } else {
            self.write(|coordinator| surface::invoke(coordinator, op, args))
        }
    }

    /// Unwrap the coordinator if this is the last handle.
    pub fn try_into_inner(self) -> Result<LifecycleCoordinator, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(lock) => Ok(lock.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(Self { inner }),
        }
    }
}
