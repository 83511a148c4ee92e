// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Counting semaphore.
//!
//! `std::sync` has no semaphore, so we build one from a mutex-guarded
//! counter and a condition variable. Waits with a timeout report expiry
//! instead of returning an error, which keeps callers free of poisoning
//! concerns: a poisoned lock here means a panicking peer thread, which is
//! already fatal for the owning object.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct Semaphore {
    permits: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Semaphore {
            permits: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    /// Make one permit available, waking a single waiter if any.
    pub fn post(&self) {
        let mut permits = self.permits.lock().expect("Poisoned mutex");
        *permits += 1;
        self.cond.notify_one();
    }

    /// Take a permit without blocking. Returns false if none was available.
    pub fn try_wait(&self) -> bool {
        let mut permits = self.permits.lock().expect("Poisoned mutex");
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Block until a permit is available.
    pub fn wait(&self) {
        let mut permits = self.permits.lock().expect("Poisoned mutex");
        while *permits == 0 {
            permits = self.cond.wait(permits).expect("Poisoned mutex");
        }
        *permits -= 1;
    }

    /// Block until a permit is available or `timeout` elapses. Returns
    /// false on expiry.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut permits = self.permits.lock().expect("Poisoned mutex");
        while *permits == 0 {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self
                .cond
                .wait_timeout(permits, deadline - now)
                .expect("Poisoned mutex");
            permits = guard;
            if result.timed_out() && *permits == 0 {
                return false;
            }
        }
        *permits -= 1;
        true
    }
}
