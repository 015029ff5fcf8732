//! System-call ABI shared by the kernel and the user stub library.
//!
//! A syscall is a [`Frame`] carrying a service number and five
//! pointer-sized argument slots, passed through [`trap`]. The kernel
//! installs one handler per service number in the system-call vector at
//! startup; the user stubs marshal typed arguments into the slots and
//! unpack results after the trap returns. The slot encoding (integers
//! sign-extended through `usize`, buffers as pointer + length) is part of
//! the ABI and must be preserved bit-exactly on both sides.

use std::sync::RwLock;

use muon_core::psr;

/// Size of the system-call vector.
pub const MAXSYSCALLS: usize = 50;

/// Delay the caller for a number of seconds.
pub const SYS_SLEEP: usize = 12;
/// Read sectors from a disk unit.
pub const SYS_DISKREAD: usize = 13;
/// Write sectors to a disk unit.
pub const SYS_DISKWRITE: usize = 14;
/// Query a disk unit's geometry.
pub const SYS_DISKSIZE: usize = 15;
/// Read one line from a terminal unit.
pub const SYS_TERMREAD: usize = 16;
/// Write a line to a terminal unit.
pub const SYS_TERMWRITE: usize = 17;

/// Trap frame: service number plus five opaque argument slots.
///
/// Slot meaning per service (in/out):
/// - disk read/write: `arg1` = buffer, `arg2` = sectors, `arg3` = track,
///   `arg4` = first sector, `arg5` = unit; on return `arg1` = device
///   status, `arg4` = result code.
/// - terminal read/write: `arg1` = buffer, `arg2` = size in / bytes
///   transferred out, `arg3` = unit; on return `arg4` = result code.
/// - sleep: `arg1` = seconds; on return `arg4` = result code.
/// - disk size: `arg1` = unit in / sector size out, `arg2` = track size
///   out, `arg3` = track count out, `arg4` = result code out.
#[derive(Debug, Default, Clone, Copy)]
pub struct Frame {
    /// Service number (`SYS_*`).
    pub number: usize,
    /// First argument slot.
    pub arg1: usize,
    /// Second argument slot.
    pub arg2: usize,
    /// Third argument slot.
    pub arg3: usize,
    /// Fourth argument slot; carries the result code on return.
    pub arg4: usize,
    /// Fifth argument slot.
    pub arg5: usize,
}

impl Frame {
    /// Creates a frame for the given service with zeroed slots.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }
}

/// Slot coercions for integer arguments.
///
/// Integers travel through the pointer-sized slots sign-extended, the way
/// the original frame squeezes `int` through `void *`.
pub mod slot {
    /// Packs an `i32` into an argument slot.
    pub fn pack(v: i32) -> usize {
        v as isize as usize
    }

    /// Unpacks an `i32` from an argument slot.
    pub fn unpack(s: usize) -> i32 {
        s as isize as i32
    }
}

/// A system-call handler: runs in kernel mode on the caller's thread.
pub type Handler = fn(&mut Frame);

static SYSCALL_VEC: RwLock<[Option<Handler>; MAXSYSCALLS]> = RwLock::new([None; MAXSYSCALLS]);

/// Installs a handler for a service number.
pub fn install(number: usize, handler: Handler) {
    if number >= MAXSYSCALLS {
        muon_core::halt("install: syscall number out of range");
    }
    SYSCALL_VEC.write().unwrap()[number] = Some(handler);
}

/// Clears the whole system-call vector (support-layer shutdown).
pub fn reset() {
    *SYSCALL_VEC.write().unwrap() = [None; MAXSYSCALLS];
}

/// Trap entry: switches the caller into kernel mode and dispatches.
///
/// Halts on protocol violations: a trap raised while already in kernel
/// mode, an out-of-range number, or a service with no installed handler.
/// The handler is responsible for switching back to user mode before it
/// returns.
pub fn trap(frame: &mut Frame) {
    if psr::in_kernel_mode() {
        muon_core::halt("trap: syscall invoked from kernel mode");
    }
    psr::enter_kernel_mode();
    let handler = match SYSCALL_VEC.read().unwrap().get(frame.number) {
        Some(Some(handler)) => *handler,
        _ => muon_core::halt("trap: no handler for syscall"),
    };
    handler(frame);
}
