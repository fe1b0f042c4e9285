//! Process-wide lazily constructed instance with a retryable constructor.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

/// Slot holding at most one successfully constructed `T`.
///
/// Double-checked: the fast path only takes a read lock; construction runs
/// under an async mutex so concurrent first callers wait for the one doing the
/// work and then observe its result. A failed or cancelled construction leaves
/// the slot empty for the next caller to retry.
#[derive(Debug)]
pub struct SingletonSlot<T> {
    value: RwLock<Option<Arc<T>>>,
    init: Mutex<()>,
}

impl<T> Default for SingletonSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingletonSlot<T> {
    pub const fn new() -> Self {
        Self {
            value: parking_lot::const_rwlock(None),
            init: Mutex::const_new(()),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.value.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.value.read().is_some()
    }

    /// Return the instance, constructing it with `init` if the slot is empty.
    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let _guard = self.init.lock().await;
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let value = Arc::new(init().await?);
        *self.value.write() = Some(value.clone());
        Ok(value)
    }
}
