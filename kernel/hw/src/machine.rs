//! The machine: one clock, a row of disks, a row of terminals.
//!
//! [`Machine::start`] brings every device thread up; [`Machine::stop`]
//! halts them and joins. Drivers block in [`Machine::wait_device`] for
//! the next interrupt of their device. The machine outlives the drivers:
//! the support layer stops it only after every driver has exited.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::clock::{ClockConfig, ClockDevice};
use crate::disk::{DiskConfig, DiskDevice};
use crate::term::{TermConfig, TermDevice};
use crate::DeviceKind;

/// Shape of the simulated machine.
#[derive(Debug, Clone, Default)]
pub struct MachineConfig {
    /// Clock rate.
    pub clock: ClockConfig,
    /// One entry per disk unit.
    pub disks: Vec<DiskConfig>,
    /// One entry per terminal unit.
    pub terms: Vec<TermConfig>,
}

impl MachineConfig {
    /// A machine with default-configured devices for the given unit counts.
    pub fn with_units(disk_units: usize, term_units: usize) -> Self {
        Self {
            clock: ClockConfig::default(),
            disks: (0..disk_units).map(|_| DiskConfig::default()).collect(),
            terms: (0..term_units).map(|_| TermConfig::default()).collect(),
        }
    }
}

/// Why a [`Machine::wait_device`] call returned without a status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    /// The waiting process was zapped; it should wind down instead of
    /// acting on device state.
    #[error("zapped while waiting for a device interrupt")]
    Zapped,
}

/// The simulated hardware a support layer runs against.
pub struct Machine {
    clock: Arc<ClockDevice>,
    disks: Vec<Arc<DiskDevice>>,
    terms: Vec<Arc<TermDevice>>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Machine {
    /// Builds the devices and starts their threads.
    pub fn start(cfg: MachineConfig) -> Arc<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let clock = Arc::new(ClockDevice::new(cfg.clock));
        let disks: Vec<_> = cfg
            .disks
            .into_iter()
            .map(|c| Arc::new(DiskDevice::new(c)))
            .collect();
        let terms: Vec<_> = cfg
            .terms
            .into_iter()
            .map(|c| Arc::new(TermDevice::new(c)))
            .collect();

        let mut threads = Vec::new();
        {
            let (dev, flag) = (Arc::clone(&clock), Arc::clone(&running));
            threads.push(std::thread::spawn(move || dev.run(&flag)));
        }
        for disk in &disks {
            let dev = Arc::clone(disk);
            threads.push(std::thread::spawn(move || dev.run()));
        }
        for term in &terms {
            let (dev, flag) = (Arc::clone(term), Arc::clone(&running));
            threads.push(std::thread::spawn(move || dev.run(&flag)));
        }
        log::debug!(
            target: "muon::hw",
            "machine up: {} disk(s), {} terminal(s)",
            disks.len(),
            terms.len()
        );

        Arc::new(Self {
            clock,
            disks,
            terms,
            running,
            threads: Mutex::new(threads),
        })
    }

    /// Halts every device thread and joins them.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        for disk in &self.disks {
            disk.halt_thread();
        }
        for handle in self.threads.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
        log::debug!(target: "muon::hw", "machine stopped");
    }

    /// Simulated microseconds since the machine started.
    pub fn now_us(&self) -> u64 {
        self.clock.now_us()
    }

    /// Number of disk units.
    pub fn disk_units(&self) -> usize {
        self.disks.len()
    }

    /// Number of terminal units.
    pub fn term_units(&self) -> usize {
        self.terms.len()
    }

    /// A disk unit's registers. Panics on a bad unit; callers validate
    /// unit numbers before touching hardware.
    pub fn disk(&self, unit: usize) -> &DiskDevice {
        &self.disks[unit]
    }

    /// A terminal unit's registers. Panics on a bad unit.
    pub fn term(&self, unit: usize) -> &TermDevice {
        &self.terms[unit]
    }

    /// Blocks until the named device raises an interrupt, returning its
    /// status word.
    ///
    /// Returns [`WaitError::Zapped`] when the interrupt arrives after the
    /// calling process has been zapped.
    pub fn wait_device(&self, kind: DeviceKind, unit: usize) -> Result<i32, WaitError> {
        let status = match kind {
            DeviceKind::Clock => self.clock.int.recv(),
            DeviceKind::Disk => self.disks[unit].int.recv(),
            DeviceKind::Terminal => self.terms[unit].int.recv(),
        };
        if muon_core::proc::is_zapped() {
            return Err(WaitError::Zapped);
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clock_advances_simulated_time() {
        let machine = Machine::start(MachineConfig {
            clock: ClockConfig {
                tick: Duration::from_millis(1),
                us_per_tick: 100_000,
            },
            ..Default::default()
        });
        // Interrupts may already be buffered; keep taking them until the
        // counter shows two ticks' worth of progress.
        let before = machine.now_us();
        while machine.now_us() < before + 200_000 {
            machine.wait_device(DeviceKind::Clock, 0).unwrap();
        }
        machine.stop();
    }

    #[test]
    fn stop_joins_all_device_threads() {
        let machine = Machine::start(MachineConfig::with_units(2, 2));
        machine.stop();
        assert!(machine.threads.lock().unwrap().is_empty());
    }
}
