//! Simulated hardware substrate.
//!
//! One [`Machine`] owns a clock, a row of disks, and a row of terminals,
//! each running on its own device thread. Drivers talk to a device the
//! way the real support layer would: write a command or control word to
//! it, then block in [`Machine::wait_device`] until the device raises an
//! interrupt carrying a status word.
//!
//! Everything the devices do is observable for tests: the clock's rate is
//! configurable (so "seconds" of simulated time can pass in milliseconds
//! of wall time), disks record every serviced operation, and terminals
//! take scripted input and capture transmitted output.

mod clock;
mod disk;
mod machine;
mod term;

pub use clock::ClockConfig;
pub use disk::{DiskCommand, DiskConfig, DiskDevice, SECTOR_SIZE, SECTORS_PER_TRACK, ServicedOp};
pub use machine::{Machine, MachineConfig, WaitError};
pub use term::{TermConfig, TermDevice, control, status};

/// Device completed the operation.
pub const DEV_READY: i32 = 0;
/// Device rejected or failed the operation.
pub const DEV_ERROR: i32 = 1;

/// The three device classes a driver can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// The single system clock.
    Clock,
    /// A disk unit.
    Disk,
    /// A terminal unit.
    Terminal,
}
