//! Disk device.
//!
//! A disk is a flat in-memory sector store with a current-track register.
//! Commands arrive one at a time through [`DiskDevice::output`]; each
//! completion raises an interrupt whose status word reports success or
//! rejection. Transfers move whole sectors between the store and the
//! device's data register.
//!
//! Every serviced command is appended to an op log so tests can assert
//! the order the driver actually moved the head in.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use muon_core::sync::Mailbox;

use crate::clock::INT_LINE_DEPTH;
use crate::{DEV_ERROR, DEV_READY};

/// Bytes per sector.
pub const SECTOR_SIZE: usize = 512;
/// Sectors per track.
pub const SECTORS_PER_TRACK: usize = 16;

/// Disk shape and timing.
#[derive(Debug, Clone)]
pub struct DiskConfig {
    /// Number of tracks on the unit.
    pub tracks: usize,
    /// Wall-clock latency applied to every command.
    pub op_delay: Duration,
    /// Initial content, copied over the zero-filled store.
    pub image: Option<Vec<u8>>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            tracks: 32,
            op_delay: Duration::ZERO,
            image: None,
        }
    }
}

/// A command written to the disk's request register.
#[derive(Debug)]
pub enum DiskCommand {
    /// Report the track count through the tracks register.
    Tracks,
    /// Move the head to a track.
    Seek {
        /// Target track.
        track: usize,
    },
    /// Read one sector of the current track into the data register.
    Read {
        /// Sector within the current track.
        sector: usize,
    },
    /// Write one sector of the current track.
    Write {
        /// Sector within the current track.
        sector: usize,
        /// Sector payload.
        data: Box<[u8; SECTOR_SIZE]>,
    },
}

/// One serviced command, as recorded in the op log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServicedOp {
    /// Track-count query.
    Tracks,
    /// Head movement to the given track.
    Seek(usize),
    /// Sector read at (track, sector).
    Read(usize, usize),
    /// Sector write at (track, sector).
    Write(usize, usize),
}

struct DiskState {
    storage: Vec<u8>,
    track: usize,
}

/// A simulated disk unit.
pub struct DiskDevice {
    tracks: usize,
    op_delay: Duration,
    cmd: Mailbox<Option<DiskCommand>>,
    pub(crate) int: Mailbox<i32>,
    state: Mutex<DiskState>,
    data_reg: Mutex<Option<Box<[u8; SECTOR_SIZE]>>>,
    tracks_reg: AtomicI32,
    log: Mutex<Vec<ServicedOp>>,
}

impl DiskDevice {
    pub(crate) fn new(cfg: DiskConfig) -> Self {
        let mut storage = vec![0u8; cfg.tracks * SECTORS_PER_TRACK * SECTOR_SIZE];
        if let Some(image) = cfg.image {
            let n = image.len().min(storage.len());
            storage[..n].copy_from_slice(&image[..n]);
        }
        Self {
            tracks: cfg.tracks,
            op_delay: cfg.op_delay,
            cmd: Mailbox::new(1),
            int: Mailbox::new(INT_LINE_DEPTH),
            state: Mutex::new(DiskState { storage, track: 0 }),
            data_reg: Mutex::new(None),
            tracks_reg: AtomicI32::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Writes a command to the request register.
    ///
    /// Completion is signalled by an interrupt; the driver must not issue
    /// another command before waiting for it.
    pub fn output(&self, cmd: DiskCommand) {
        self.cmd.send(Some(cmd));
    }

    /// Takes the data register content left by the last `Read`.
    pub fn take_data(&self) -> Option<Box<[u8; SECTOR_SIZE]>> {
        self.data_reg.lock().unwrap().take()
    }

    /// Reads the tracks register written by the last `Tracks` query.
    pub fn tracks_reg(&self) -> i32 {
        self.tracks_reg.load(Ordering::Acquire)
    }

    /// Snapshot of the op log (test observability).
    pub fn serviced(&self) -> Vec<ServicedOp> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn halt_thread(&self) {
        self.cmd.send(None);
    }

    /// Device thread: execute commands until told to halt.
    pub(crate) fn run(&self) {
        while let Some(cmd) = self.cmd.recv() {
            if !self.op_delay.is_zero() {
                std::thread::sleep(self.op_delay);
            }
            let status = self.exec(cmd);
            self.int.cond_send(status);
        }
    }

    fn exec(&self, cmd: DiskCommand) -> i32 {
        let mut state = self.state.lock().unwrap();
        let track = state.track;
        match cmd {
            DiskCommand::Tracks => {
                self.tracks_reg.store(self.tracks as i32, Ordering::Release);
                self.log.lock().unwrap().push(ServicedOp::Tracks);
                DEV_READY
            }
            DiskCommand::Seek { track } => {
                if track >= self.tracks {
                    return DEV_ERROR;
                }
                state.track = track;
                self.log.lock().unwrap().push(ServicedOp::Seek(track));
                DEV_READY
            }
            DiskCommand::Read { sector } => {
                if sector >= SECTORS_PER_TRACK {
                    return DEV_ERROR;
                }
                let off = (track * SECTORS_PER_TRACK + sector) * SECTOR_SIZE;
                let mut data = Box::new([0u8; SECTOR_SIZE]);
                data.copy_from_slice(&state.storage[off..off + SECTOR_SIZE]);
                *self.data_reg.lock().unwrap() = Some(data);
                self.log.lock().unwrap().push(ServicedOp::Read(track, sector));
                DEV_READY
            }
            DiskCommand::Write { sector, data } => {
                if sector >= SECTORS_PER_TRACK {
                    return DEV_ERROR;
                }
                let off = (track * SECTORS_PER_TRACK + sector) * SECTOR_SIZE;
                state.storage[off..off + SECTOR_SIZE].copy_from_slice(&data[..]);
                self.log.lock().unwrap().push(ServicedOp::Write(track, sector));
                DEV_READY
            }
        }
    }
}
