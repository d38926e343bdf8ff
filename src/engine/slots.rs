#![forbid(unsafe_code)]

use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Counting semaphore for blocking worker threads.
#[derive(Clone, Debug)]
pub struct Slots {
    inner: Arc<SlotsInner>,
}

#[derive(Debug)]
struct SlotsInner {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

impl Slots {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(SlotsInner {
                available: Mutex::new(capacity),
                released: Condvar::new(),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn available(&self) -> usize {
        *self
            .inner
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a slot frees up. The slot is returned when the guard drops.
    pub fn acquire(&self) -> SlotGuard {
        let mut available = self
            .inner
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *available == 0 {
            available = self
                .inner
                .released
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        SlotGuard {
            inner: self.inner.clone(),
        }
    }
}

#[derive(Debug)]
pub struct SlotGuard {
    inner: Arc<SlotsInner>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut available = self
            .inner
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *available += 1;
        self.inner.released.notify_one();
    }
}
