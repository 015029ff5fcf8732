//! Shared test rig: an accelerated machine matching the kernel config.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use muon_hw::{ClockConfig, DiskConfig, Machine, MachineConfig, TermConfig};
use muon_kernel::config::{DISK_UNITS, TERM_UNITS};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A machine where one simulated second passes in ten wall milliseconds
/// and terminals move a character per millisecond.
pub fn fast_config() -> MachineConfig {
    MachineConfig {
        clock: ClockConfig {
            tick: Duration::from_millis(1),
            us_per_tick: 100_000,
        },
        disks: (0..DISK_UNITS).map(|_| DiskConfig::default()).collect(),
        terms: (0..TERM_UNITS)
            .map(|_| TermConfig {
                tick: Duration::from_millis(1),
            })
            .collect(),
    }
}

pub fn fast_machine() -> Arc<Machine> {
    Machine::start(fast_config())
}
