//! Startup and teardown of the support layer.
//!
//! [`start`] boots against a running [`Machine`]: process table and
//! syscall vector first, then the drivers in dependency order (clock,
//! disks, terminal triples), each awaited on the readiness semaphore.
//! The user entry point runs as a user-mode process; once it exits, the
//! drivers are taken down in the same order they came up.

use std::sync::{Arc, Mutex, RwLock};

use muon_core::proc::{self, Mode, ProcHandle};
use muon_core::psr::{self, Psr};
use muon_core::sync::Semaphore;
use muon_hw::Machine;

use crate::config::{DISK_UNITS, TERM_UNITS};
use crate::disk::{DiskUnit, disk_driver};
use crate::sleep::SleepList;
use crate::term::{Line, TermUnit, term_driver, term_reader, term_writer};
use crate::{clock, proc::ProcTable, syscall};

/// Everything the services and drivers share.
pub struct Support {
    /// The hardware underneath.
    pub machine: Arc<Machine>,
    /// Process table (C1).
    pub table: ProcTable,
    /// Sleep list (C2).
    pub sleepers: SleepList,
    /// Per-unit disk state (C4/C5).
    pub disks: Vec<DiskUnit>,
    /// Per-unit terminal state (C6–C8).
    pub terms: Vec<TermUnit>,
    /// Readiness handshake: each driver releases once initialized.
    pub sem_running: Semaphore,
}

/// The running support layer, if any.
///
/// Constructed by [`start`], torn down on its way out. Syscall handlers
/// reach the layer through here; everything else carries an `Arc`.
static SUPPORT: RwLock<Option<Arc<Support>>> = RwLock::new(None);

/// Serializes [`start`] invocations within one process (test binaries
/// run cases concurrently).
static BOOT_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn support() -> Arc<Support> {
    match &*SUPPORT.read().unwrap() {
        Some(support) => Arc::clone(support),
        None => muon_core::halt("support layer is not running"),
    }
}

/// Boots the support layer, runs `user_main` as a user-mode process, and
/// tears everything down after it exits.
///
/// The machine must be started by the caller and must match the unit
/// counts in [`crate::config`]; it is stopped here during teardown.
pub fn start(machine: Arc<Machine>, user_main: impl FnOnce() + Send + 'static) {
    let _boot = BOOT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    psr::set(Psr::CURRENT_MODE);

    if machine.disk_units() != DISK_UNITS || machine.term_units() != TERM_UNITS {
        muon_core::halt("start: machine shape does not match configuration");
    }

    let support = Arc::new(Support {
        machine: Arc::clone(&machine),
        table: ProcTable::new(),
        sleepers: SleepList::new(),
        disks: (0..DISK_UNITS).map(|_| DiskUnit::new()).collect(),
        terms: (0..TERM_UNITS).map(|_| TermUnit::new()).collect(),
        sem_running: Semaphore::new(0),
    });
    {
        let mut global = SUPPORT.write().unwrap();
        if global.is_some() {
            muon_core::halt("start: support layer already running");
        }
        *global = Some(Arc::clone(&support));
    }
    syscall::install_handlers();

    let clock_driver = {
        let support = Arc::clone(&support);
        proc::spawn("clock driver", Mode::Kernel, move || {
            clock::clock_driver(support);
        })
    };
    support.sem_running.acquire();

    let mut disk_drivers = Vec::new();
    for unit in 0..DISK_UNITS {
        let support_ = Arc::clone(&support);
        disk_drivers.push(proc::spawn(&format!("disk driver {unit}"), Mode::Kernel, move || {
            disk_driver(support_, unit);
        }));
    }
    for _ in 0..DISK_UNITS {
        support.sem_running.acquire();
    }

    let mut term_triples = Vec::new();
    for unit in 0..TERM_UNITS {
        let s = Arc::clone(&support);
        let driver = proc::spawn(&format!("term driver {unit}"), Mode::Kernel, move || {
            term_driver(s, unit);
        });
        let s = Arc::clone(&support);
        let reader = proc::spawn(&format!("term reader {unit}"), Mode::Kernel, move || {
            term_reader(s, unit);
        });
        let s = Arc::clone(&support);
        let writer = proc::spawn(&format!("term writer {unit}"), Mode::Kernel, move || {
            term_writer(s, unit);
        });
        for _ in 0..3 {
            support.sem_running.acquire();
        }
        term_triples.push((driver, reader, writer));
    }
    log::debug!(target: "muon::start", "all drivers ready, spawning user entry");

    proc::spawn("start4", Mode::User, user_main).join();

    shutdown(&support, clock_driver, disk_drivers, term_triples);
}

/// Takes the drivers down: clock, disks, then each terminal triple.
///
/// Every zap is paired with a wakeup on whatever the target blocks on so
/// the zap can be observed.
fn shutdown(
    support: &Arc<Support>,
    clock_driver: ProcHandle,
    disk_drivers: Vec<ProcHandle>,
    term_triples: Vec<(ProcHandle, ProcHandle, ProcHandle)>,
) {
    log::debug!(target: "muon::start", "user entry exited, shutting down");

    // The clock keeps ticking, so the driver observes the zap on its own.
    clock_driver.zap();
    clock_driver.join();

    for (unit, driver) in disk_drivers.into_iter().enumerate() {
        support.disks[unit]
            .shutdown
            .store(true, std::sync::atomic::Ordering::Release);
        support.disks[unit].wake.send(());
        driver.join();
    }

    for (unit, (driver, reader, writer)) in term_triples.into_iter().enumerate() {
        // One sentinel line forces a final receive interrupt for the
        // zapped driver to wake on.
        driver.zap();
        let dev = support.machine.term(unit);
        support.terms[unit].enable_recv(dev);
        dev.feed_input(b"\n");
        driver.join();

        reader.zap();
        support.terms[unit].char_in.send(0);
        reader.join();

        writer.zap();
        support.terms[unit].write_lines.send(Line::from_bytes(b""));
        writer.join();
    }

    support.machine.stop();
    muon_syscall::reset();
    *SUPPORT.write().unwrap() = None;
    psr::set(Psr::empty());
}
