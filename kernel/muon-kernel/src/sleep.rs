//! Timed sleep: the sorted sleep list and the sleep service.
//!
//! Sleepers park themselves on a list ordered by absolute wakeup time;
//! the clock driver pops due entries from the head on every tick. Links
//! are table indices held by the list itself, so one lock guards the
//! head and every link.

use std::sync::Mutex;

use crate::config::MAXPROC;
use crate::error::{Result, ServiceError};
use crate::start::Support;

/// The time-ordered list of sleeping processes.
pub struct SleepList {
    inner: Mutex<SleepInner>,
}

struct SleepInner {
    head: Option<usize>,
    next: [Option<usize>; MAXPROC],
    wake_us: [u64; MAXPROC],
}

impl SleepList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SleepInner {
                head: None,
                next: [None; MAXPROC],
                wake_us: [0; MAXPROC],
            }),
        }
    }

    /// Inserts a slot, keeping ascending wakeup order.
    ///
    /// An entry with an equal deadline goes after the existing ones.
    pub fn insert(&self, idx: usize, wake_us: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.wake_us[idx] = wake_us;
        inner.next[idx] = None;

        let mut prev: Option<usize> = None;
        let mut cur = inner.head;
        while let Some(c) = cur {
            if inner.wake_us[c] > wake_us {
                break;
            }
            prev = cur;
            cur = inner.next[c];
        }
        inner.next[idx] = cur;
        match prev {
            Some(p) => inner.next[p] = Some(idx),
            None => inner.head = Some(idx),
        }
    }

    /// Pops the head if its deadline has passed.
    pub fn pop_due(&self, now_us: u64) -> Option<usize> {
        let mut inner = self.inner.lock().unwrap();
        let head = inner.head?;
        if inner.wake_us[head] < now_us {
            inner.head = inner.next[head];
            inner.next[head] = None;
            Some(head)
        } else {
            None
        }
    }

    /// Unlinks everything, in order. Shutdown only.
    pub fn drain(&self) -> Vec<usize> {
        let mut inner = self.inner.lock().unwrap();
        let mut out = Vec::new();
        let mut cur = inner.head.take();
        while let Some(c) = cur {
            out.push(c);
            cur = inner.next[c].take();
        }
        out
    }
}

/// Kernel-mode implementation of the sleep service.
///
/// Computes the absolute deadline, links the caller into the sleep list,
/// and blocks on the private mailbox until the clock driver's wakeup.
pub fn sleep_real(support: &Support, seconds: i32) -> Result<()> {
    if seconds < 0 {
        return Err(ServiceError::InvalidArgument);
    }
    let wake_us = support.machine.now_us() + 1_000_000 * seconds as u64;

    let pid = muon_core::proc::current_pid();
    let idx = support.table.claim(pid);
    {
        let mut scratch = support.table.slot(idx).scratch.lock().unwrap();
        scratch.wake_time_us = wake_us;
    }
    log::trace!(target: "muon::sleep", "pid {pid} sleeping until {wake_us}us");

    support.sleepers.insert(idx, wake_us);
    support.table.slot(idx).mbox.recv();
    support.table.release(idx);
    Ok(())
}
