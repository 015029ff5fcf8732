//! Syscall handlers.
//!
//! One handler per service: confirm the trap landed us in kernel mode,
//! unpack the frame's argument slots, run the real routine, pack results
//! back, and drop to user mode before returning. Buffers travel through
//! the slots as pointer + element count; the stub owns the borrow and the
//! trap runs on its thread, so reconstructing the slice here stays within
//! that live borrow.

use muon_core::psr;
use muon_hw::SECTOR_SIZE;
use muon_syscall::{
    Frame, SYS_DISKREAD, SYS_DISKSIZE, SYS_DISKWRITE, SYS_SLEEP, SYS_TERMREAD, SYS_TERMWRITE, slot,
};

use crate::error::code;
use crate::start::support;
use crate::{disk, sleep, term};

/// Installs the six service handlers in the system-call vector.
pub fn install_handlers() {
    muon_syscall::install(SYS_SLEEP, sleep_handler);
    muon_syscall::install(SYS_DISKSIZE, disk_size_handler);
    muon_syscall::install(SYS_DISKREAD, disk_read_handler);
    muon_syscall::install(SYS_DISKWRITE, disk_write_handler);
    muon_syscall::install(SYS_TERMREAD, term_read_handler);
    muon_syscall::install(SYS_TERMWRITE, term_write_handler);
}

fn check_kernel_mode(who: &str) {
    if !psr::in_kernel_mode() {
        muon_core::halt(&format!("{who}: handler entered outside kernel mode"));
    }
}

/// Rebuilds the caller's mutable byte buffer from frame slots.
///
/// # Safety
///
/// `addr` and `len` must describe a live, exclusively-borrowed byte
/// buffer owned by the trapping stub on this thread.
unsafe fn out_buf<'a>(addr: usize, len: usize) -> &'a mut [u8] {
    if len == 0 {
        &mut []
    } else {
        unsafe { std::slice::from_raw_parts_mut(addr as *mut u8, len) }
    }
}

/// Rebuilds the caller's read-only byte buffer from frame slots.
///
/// # Safety
///
/// As [`out_buf`], for a shared borrow.
unsafe fn in_buf<'a>(addr: usize, len: usize) -> &'a [u8] {
    if len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(addr as *const u8, len) }
    }
}

fn sleep_handler(frame: &mut Frame) {
    check_kernel_mode("sleep");
    let seconds = slot::unpack(frame.arg1);
    let result = sleep::sleep_real(&support(), seconds);
    frame.arg4 = slot::pack(code(&result));
    psr::enter_user_mode();
}

fn disk_size_handler(frame: &mut Frame) {
    check_kernel_mode("disk_size");
    let unit = slot::unpack(frame.arg1);
    let result = disk::disk_size_real(&support(), unit);
    if let Ok((sector, track, disks)) = result {
        frame.arg1 = slot::pack(sector);
        frame.arg2 = slot::pack(track);
        frame.arg3 = slot::pack(disks);
    }
    frame.arg4 = slot::pack(code(&result));
    psr::enter_user_mode();
}

fn disk_read_handler(frame: &mut Frame) {
    check_kernel_mode("disk_read");
    let sectors = slot::unpack(frame.arg2);
    let track = slot::unpack(frame.arg3);
    let first = slot::unpack(frame.arg4);
    let unit = slot::unpack(frame.arg5);
    let len = if sectors > 0 {
        sectors as usize * SECTOR_SIZE
    } else {
        0
    };
    // SAFETY: the stub passed its own live buffer of exactly `len` bytes.
    let buf = unsafe { out_buf(frame.arg1, len) };
    let result = disk::disk_read_real(&support(), buf, sectors, track, first, unit);
    if let Ok(status) = result {
        frame.arg1 = slot::pack(status);
    }
    frame.arg4 = slot::pack(code(&result));
    psr::enter_user_mode();
}

fn disk_write_handler(frame: &mut Frame) {
    check_kernel_mode("disk_write");
    let sectors = slot::unpack(frame.arg2);
    let track = slot::unpack(frame.arg3);
    let first = slot::unpack(frame.arg4);
    let unit = slot::unpack(frame.arg5);
    let len = if sectors > 0 {
        sectors as usize * SECTOR_SIZE
    } else {
        0
    };
    // SAFETY: the stub passed its own live buffer of exactly `len` bytes.
    let buf = unsafe { in_buf(frame.arg1, len) };
    let result = disk::disk_write_real(&support(), buf, sectors, track, first, unit);
    if let Ok(status) = result {
        frame.arg1 = slot::pack(status);
    }
    frame.arg4 = slot::pack(code(&result));
    psr::enter_user_mode();
}

fn term_read_handler(frame: &mut Frame) {
    check_kernel_mode("term_read");
    let size = slot::unpack(frame.arg2);
    let unit = slot::unpack(frame.arg3);
    let len = if size > 0 { size as usize } else { 0 };
    // SAFETY: the stub passed its own live buffer of exactly `len` bytes.
    let buf = unsafe { out_buf(frame.arg1, len) };
    let result = term::term_read_real(&support(), buf, size, unit);
    if let Ok(n) = result {
        frame.arg2 = slot::pack(n);
    }
    frame.arg4 = slot::pack(code(&result));
    psr::enter_user_mode();
}

fn term_write_handler(frame: &mut Frame) {
    check_kernel_mode("term_write");
    let size = slot::unpack(frame.arg2);
    let unit = slot::unpack(frame.arg3);
    let len = if size > 0 { size as usize } else { 0 };
    // SAFETY: the stub passed its own live buffer of exactly `len` bytes.
    let buf = unsafe { in_buf(frame.arg1, len) };
    let result = term::term_write_real(&support(), buf, size, unit);
    if let Ok(n) = result {
        frame.arg2 = slot::pack(n);
    }
    frame.arg4 = slot::pack(code(&result));
    psr::enter_user_mode();
}
