//! Compile-time configuration.
//!
//! Single source of truth for the sizes the support layer is built for.
//! The machine passed to [`start`](crate::start) must match the unit
//! counts here.

/// Process table capacity; pids map to slots modulo this.
pub const MAXPROC: usize = 50;

/// Maximum terminal line length, excluding nothing: a delivered line is
/// at most this many bytes including a trailing newline.
pub const MAXLINE: usize = 80;

/// Number of disk units.
pub const DISK_UNITS: usize = 2;

/// Number of terminal units.
pub const TERM_UNITS: usize = 4;

/// Completed input lines buffered per terminal before further lines are
/// dropped.
pub const TERM_LINE_DEPTH: usize = 10;

pub use muon_hw::{SECTOR_SIZE, SECTORS_PER_TRACK};
