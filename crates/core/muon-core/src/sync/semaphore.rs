//! Counting semaphore.
//!
//! [`Semaphore`] coordinates startup handshakes: drivers release a permit
//! once initialized, the booting process acquires one per driver it waits
//! for.

use std::sync::{Condvar, Mutex};

/// A counting semaphore.
///
/// Acquiring a permit decrements the count, blocking while it is zero;
/// releasing increments it.
pub struct Semaphore {
    permits: Mutex<u32>,
    available: Condvar,
}

impl Semaphore {
    /// Creates a new semaphore with the given number of permits.
    pub fn new(permits: u32) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Acquires a permit, blocking until one is available.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock().unwrap();
        while *permits == 0 {
            permits = self.available.wait(permits).unwrap();
        }
        *permits -= 1;
    }

    /// Tries to acquire a permit without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock().unwrap();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Releases a permit back to the semaphore.
    pub fn release(&self) {
        *self.permits.lock().unwrap() += 1;
        self.available.notify_one();
    }

    /// Returns the number of currently available permits.
    pub fn available_permits(&self) -> u32 {
        *self.permits.lock().unwrap()
    }
}
