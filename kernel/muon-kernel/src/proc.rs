//! Process table.
//!
//! One scratch record per process slot, indexed by `pid mod MAXPROC`.
//! A slot is claimed by the owning process for the duration of one
//! blocking request and released when the request completes; the private
//! mailbox is created once at table init and never replaced.
//!
//! The private mailbox buffers a single message. A completion token sent
//! a moment before the owner blocks is held rather than lost, which is
//! what makes the drivers' conditional wakeup sends safe on a preemptive
//! runtime.

use std::sync::Mutex;

use muon_core::Pid;
use muon_core::sync::Mailbox;

use crate::config::MAXPROC;

/// Direction of an in-flight disk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskOp {
    /// Device to memory.
    Read,
    /// Memory to device.
    Write,
}

/// Parameters of an in-flight disk request, parked in the requester's
/// slot for the driver to pick up.
#[derive(Debug)]
pub struct DiskRequest {
    /// Transfer direction.
    pub op: DiskOp,
    /// Number of sectors to move.
    pub sectors: usize,
    /// Starting track.
    pub track: usize,
    /// Starting sector within the track.
    pub first: usize,
    /// Write payload (`sectors * SECTOR_SIZE` bytes); empty for reads.
    pub payload: Vec<u8>,
}

/// Mutable per-request scratch, guarded per slot.
#[derive(Default)]
pub struct Scratch {
    /// Owning pid while the slot is in use.
    pub pid: Option<Pid>,
    /// Absolute wakeup deadline in microseconds (sleep requests).
    pub wake_time_us: u64,
    /// In-flight disk request parameters.
    pub request: Option<DiskRequest>,
    /// Sector data read back by the disk driver.
    pub read_back: Vec<u8>,
    /// Device status of the completed transfer.
    pub status: i32,
}

/// One process slot.
pub struct ProcSlot {
    /// Private wakeup mailbox: the sole rendezvous between this process
    /// and whichever driver completes its request.
    pub mbox: Mailbox<i32>,
    /// Request scratch.
    pub scratch: Mutex<Scratch>,
}

impl ProcSlot {
    fn new() -> Self {
        Self {
            mbox: Mailbox::new(1),
            scratch: Mutex::new(Scratch::default()),
        }
    }
}

/// The process table.
pub struct ProcTable {
    slots: Vec<ProcSlot>,
}

impl ProcTable {
    /// Builds the table, creating every private mailbox up front.
    pub fn new() -> Self {
        Self {
            slots: (0..MAXPROC).map(|_| ProcSlot::new()).collect(),
        }
    }

    /// The slot at a table index.
    pub fn slot(&self, idx: usize) -> &ProcSlot {
        &self.slots[idx]
    }

    /// The slot a pid maps to.
    pub fn slot_of(&self, pid: Pid) -> &ProcSlot {
        &self.slots[pid.slot(MAXPROC)]
    }

    /// Claims the calling pid's slot for a request; returns its index.
    pub fn claim(&self, pid: Pid) -> usize {
        let idx = pid.slot(MAXPROC);
        self.slots[idx].scratch.lock().unwrap().pid = Some(pid);
        idx
    }

    /// Releases a slot after a completed request.
    pub fn release(&self, idx: usize) {
        let mut scratch = self.slots[idx].scratch.lock().unwrap();
        scratch.pid = None;
        scratch.request = None;
        scratch.read_back = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_marks_the_modulo_slot() {
        let table = ProcTable::new();
        let pid = Pid::new(MAXPROC as u32 + 3);
        let idx = table.claim(pid);
        assert_eq!(idx, 3);
        assert_eq!(table.slot(3).scratch.lock().unwrap().pid, Some(pid));
    }

    #[test]
    fn release_clears_request_state() {
        let table = ProcTable::new();
        let idx = table.claim(Pid::new(1));
        {
            let mut scratch = table.slot(idx).scratch.lock().unwrap();
            scratch.request = Some(DiskRequest {
                op: DiskOp::Read,
                sectors: 1,
                track: 0,
                first: 0,
                payload: Vec::new(),
            });
            scratch.read_back = vec![1, 2, 3];
        }
        table.release(idx);
        let scratch = table.slot(idx).scratch.lock().unwrap();
        assert!(scratch.pid.is_none());
        assert!(scratch.request.is_none());
        assert!(scratch.read_back.is_empty());
    }

    #[test]
    fn completion_token_outlives_the_send() {
        let table = ProcTable::new();
        let slot = table.slot(0);
        // A driver may complete before the requester reaches recv.
        assert!(slot.mbox.cond_send(0));
        assert_eq!(slot.mbox.recv(), 0);
    }
}
