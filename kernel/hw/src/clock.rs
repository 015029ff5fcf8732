//! Clock device.
//!
//! Advances the machine's microsecond counter by a fixed amount per tick
//! and raises one interrupt per tick. The ratio of simulated microseconds
//! to wall-clock tick length is configurable so tests can compress
//! multi-second sleeps into milliseconds.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use muon_core::sync::Mailbox;

use crate::DEV_READY;

/// Interrupts buffered per device before further ones are dropped.
pub(crate) const INT_LINE_DEPTH: usize = 16;

/// Clock rate configuration.
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// Wall-clock length of one tick.
    pub tick: Duration,
    /// Simulated microseconds added per tick.
    pub us_per_tick: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        // Real time: 10ms per tick, 10_000us per tick.
        Self {
            tick: Duration::from_millis(10),
            us_per_tick: 10_000,
        }
    }
}

pub(crate) struct ClockDevice {
    cfg: ClockConfig,
    now_us: AtomicU64,
    pub(crate) int: Mailbox<i32>,
}

impl ClockDevice {
    pub(crate) fn new(cfg: ClockConfig) -> Self {
        Self {
            cfg,
            now_us: AtomicU64::new(0),
            int: Mailbox::new(INT_LINE_DEPTH),
        }
    }

    /// Simulated microseconds since machine start.
    pub(crate) fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Acquire)
    }

    /// Device thread: tick, advance time, raise an interrupt.
    ///
    /// A full interrupt line means nobody is draining ticks fast enough;
    /// those ticks are simply lost, as missed clock interrupts would be.
    pub(crate) fn run(&self, running: &AtomicBool) {
        while running.load(Ordering::Acquire) {
            std::thread::sleep(self.cfg.tick);
            self.now_us.fetch_add(self.cfg.us_per_tick, Ordering::AcqRel);
            self.int.cond_send(DEV_READY);
        }
    }
}
