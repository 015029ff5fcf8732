//! Disk service: C-SCAN request queue and per-unit driver.
//!
//! Requesters park their transfer parameters in their process-table slot,
//! link themselves into the unit's queue, wake the driver, and block.
//! The driver services one request per wakeup: seek, move sectors one at
//! a time (following the track wrap), then release the requester.
//!
//! Queue order is a one-way elevator: requests at or beyond the track
//! the driver is currently serving are taken in ascending track order,
//! then the sweep wraps to the lowest pending track.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use muon_core::sync::Mailbox;
use muon_core::{proc, psr};
use muon_hw::{DEV_READY, DeviceKind, DiskCommand, SECTOR_SIZE, SECTORS_PER_TRACK};

use crate::config::{DISK_UNITS, MAXPROC};
use crate::error::{Result, ServiceError};
use crate::proc::{DiskOp, DiskRequest};
use crate::start::Support;

/// Per-unit driver state.
pub struct DiskUnit {
    /// Pending requests in C-SCAN order.
    pub queue: DiskQueue,
    /// Zero-byte wakeups from requesters (one per enqueue).
    pub wake: Mailbox<()>,
    /// Set during teardown; the next wakeup makes the driver exit.
    pub shutdown: AtomicBool,
    /// Track count learned from the device at driver startup.
    pub tracks: AtomicI32,
}

impl DiskUnit {
    pub(crate) fn new() -> Self {
        Self {
            queue: DiskQueue::new(),
            wake: Mailbox::new(MAXPROC),
            shutdown: AtomicBool::new(false),
            tracks: AtomicI32::new(0),
        }
    }
}

/// C-SCAN ordered queue of process-table slots.
pub struct DiskQueue {
    inner: Mutex<QueueInner>,
}

struct QueueInner {
    head: Option<usize>,
    next: [Option<usize>; MAXPROC],
    track: [usize; MAXPROC],
    /// Track of the request being serviced; insertion is relative to it.
    sweep: usize,
}

impl DiskQueue {
    /// Creates an empty queue with the sweep parked at track 0.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                head: None,
                next: [None; MAXPROC],
                track: [0; MAXPROC],
                sweep: 0,
            }),
        }
    }

    /// Inserts a slot by C-SCAN order relative to the current sweep track.
    ///
    /// Tracks at or beyond the sweep belong to the current pass, lower
    /// tracks to the next one; within a pass, ascending track order with
    /// equal tracks in arrival order.
    pub fn insert(&self, idx: usize, track: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.track[idx] = track;
        inner.next[idx] = None;

        let new_key = (track < inner.sweep, track);
        let mut prev: Option<usize> = None;
        let mut cur = inner.head;
        while let Some(c) = cur {
            let cur_key = (inner.track[c] < inner.sweep, inner.track[c]);
            if cur_key > new_key {
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

    /// Pops the next request and moves the sweep to its track.
    pub fn pop(&self) -> Option<usize> {
        let mut inner = self.inner.lock().unwrap();
        let head = inner.head?;
        let next = inner.next[head].take();
        inner.head = next;
        inner.sweep = inner.track[head];
        Some(head)
    }
}

/// Disk driver for one unit.
///
/// Learns the unit's geometry, signals readiness, then serves the queue
/// one request per wakeup until told to shut down. Requesters still
/// queued at shutdown are released without a transfer.
pub fn disk_driver(support: Arc<Support>, unit: usize) {
    let disk = support.machine.disk(unit);
    disk.output(DiskCommand::Tracks);
    let _ = support.machine.wait_device(DeviceKind::Disk, unit);
    let tracks = disk.tracks_reg();
    support.disks[unit].tracks.store(tracks, Ordering::Release);
    log::debug!(target: "muon::disk", "unit {unit}: {tracks} tracks");

    support.sem_running.release();
    psr::enable_interrupts();

    loop {
        support.disks[unit].wake.recv();
        if support.disks[unit].shutdown.load(Ordering::Acquire) {
            break;
        }
        let Some(idx) = support.disks[unit].queue.pop() else {
            continue;
        };
        service(&support, unit, idx, tracks as usize);
    }

    while let Some(idx) = support.disks[unit].queue.pop() {
        support.table.slot(idx).mbox.send(0);
    }
    log::debug!(target: "muon::disk", "unit {unit}: driver exiting");
}

/// Performs one queued transfer and unblocks its requester.
fn service(support: &Support, unit: usize, idx: usize, track_count: usize) {
    let req = support.table.slot(idx).scratch.lock().unwrap().request.take();
    let Some(req) = req else {
        // Queue and scratch disagree; nothing sane to transfer.
        support.table.slot(idx).mbox.send(0);
        return;
    };
    let DiskRequest {
        op,
        sectors,
        mut track,
        first,
        payload,
    } = req;

    let disk = support.machine.disk(unit);
    log::trace!(
        target: "muon::disk",
        "unit {unit}: slot {idx} {op:?} {sectors} sector(s) from track {track} sector {first}"
    );

    disk.output(DiskCommand::Seek { track });
    let mut status = wait(support, unit);
    let mut sector = first;
    let mut read_back = Vec::new();

    if status == DEV_READY {
        for i in 0..sectors {
            status = match op {
                DiskOp::Read => {
                    disk.output(DiskCommand::Read { sector });
                    let status = wait(support, unit);
                    if status == DEV_READY {
                        if let Some(data) = disk.take_data() {
                            read_back.extend_from_slice(&data[..]);
                        }
                    }
                    status
                }
                DiskOp::Write => {
                    let mut data = Box::new([0u8; SECTOR_SIZE]);
                    data.copy_from_slice(&payload[i * SECTOR_SIZE..(i + 1) * SECTOR_SIZE]);
                    disk.output(DiskCommand::Write { sector, data });
                    wait(support, unit)
                }
            };
            if status != DEV_READY {
                break;
            }
            sector += 1;
            if sector == SECTORS_PER_TRACK && i + 1 < sectors {
                sector = 0;
                track = (track + 1) % track_count;
                disk.output(DiskCommand::Seek { track });
                status = wait(support, unit);
                if status != DEV_READY {
                    break;
                }
            }
        }
    }

    {
        let mut scratch = support.table.slot(idx).scratch.lock().unwrap();
        scratch.status = status;
        scratch.read_back = read_back;
    }
    support.table.slot(idx).mbox.send(0);
}

fn wait(support: &Support, unit: usize) -> i32 {
    support
        .machine
        .wait_device(DeviceKind::Disk, unit)
        .unwrap_or(muon_hw::DEV_ERROR)
}

/// Kernel-mode implementation of the disk-size service. Non-blocking.
pub fn disk_size_real(support: &Support, unit: i32) -> Result<(i32, i32, i32)> {
    if unit < 0 || unit as usize >= DISK_UNITS {
        return Err(ServiceError::InvalidArgument);
    }
    Ok((
        SECTOR_SIZE as i32,
        SECTORS_PER_TRACK as i32,
        support.disks[unit as usize].tracks.load(Ordering::Acquire),
    ))
}

/// Kernel-mode implementation of the disk-read service.
///
/// On success the device status of the transfer is returned; the data
/// read lands in `buf`.
pub fn disk_read_real(
    support: &Support,
    buf: &mut [u8],
    sectors: i32,
    track: i32,
    first: i32,
    unit: i32,
) -> Result<i32> {
    validate(support, sectors, track, first, unit)?;
    if buf.len() < sectors as usize * SECTOR_SIZE {
        return Err(ServiceError::InvalidArgument);
    }
    let (status, read_back) = submit(
        support,
        unit as usize,
        DiskRequest {
            op: DiskOp::Read,
            sectors: sectors as usize,
            track: track as usize,
            first: first as usize,
            payload: Vec::new(),
        },
    );
    let n = read_back.len().min(buf.len());
    buf[..n].copy_from_slice(&read_back[..n]);
    Ok(status)
}

/// Kernel-mode implementation of the disk-write service.
pub fn disk_write_real(
    support: &Support,
    buf: &[u8],
    sectors: i32,
    track: i32,
    first: i32,
    unit: i32,
) -> Result<i32> {
    validate(support, sectors, track, first, unit)?;
    if first as usize >= SECTORS_PER_TRACK {
        return Err(ServiceError::InvalidArgument);
    }
    let len = sectors as usize * SECTOR_SIZE;
    if buf.len() < len {
        return Err(ServiceError::InvalidArgument);
    }
    let (status, _) = submit(
        support,
        unit as usize,
        DiskRequest {
            op: DiskOp::Write,
            sectors: sectors as usize,
            track: track as usize,
            first: first as usize,
            payload: buf[..len].to_vec(),
        },
    );
    Ok(status)
}

fn validate(support: &Support, sectors: i32, track: i32, first: i32, unit: i32) -> Result<()> {
    if unit < 0 || unit as usize >= DISK_UNITS {
        return Err(ServiceError::InvalidArgument);
    }
    let tracks = support.disks[unit as usize].tracks.load(Ordering::Acquire);
    if sectors < 0 || first < 0 || track < 0 || track >= tracks {
        return Err(ServiceError::InvalidArgument);
    }
    Ok(())
}

/// Enqueues a request, wakes the driver, and blocks until completion.
fn submit(support: &Support, unit: usize, req: DiskRequest) -> (i32, Vec<u8>) {
    let track = req.track;
    let pid = proc::current_pid();
    let idx = support.table.claim(pid);
    support.table.slot(idx).scratch.lock().unwrap().request = Some(req);

    support.disks[unit].queue.insert(idx, track);
    support.disks[unit].wake.send(());
    support.table.slot(idx).mbox.recv();

    let (status, read_back) = {
        let mut scratch = support.table.slot(idx).scratch.lock().unwrap();
        (scratch.status, std::mem::take(&mut scratch.read_back))
    };
    support.table.release(idx);
    (status, read_back)
}
