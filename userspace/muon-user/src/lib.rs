//! User-mode stubs for the support layer services.
//!
//! Each stub marshals its typed arguments into a trap [`Frame`], raises
//! the trap, and unpacks the results. Stubs must run in user mode;
//! invoking one from kernel mode is a fatal protocol violation.

use muon_core::psr;
use muon_syscall::{
    Frame, SYS_DISKREAD, SYS_DISKSIZE, SYS_DISKWRITE, SYS_SLEEP, SYS_TERMREAD, SYS_TERMWRITE,
    slot, trap,
};
use thiserror::Error;

/// Why a service call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The service rejected an argument.
    #[error("invalid argument")]
    Invalid,
}

/// Result alias for the stubs.
pub type Result<T> = std::result::Result<T, Error>;

/// Disk geometry returned by [`disk_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    /// Bytes per sector.
    pub sector_size: i32,
    /// Sectors per track.
    pub sectors_per_track: i32,
    /// Tracks on the unit.
    pub tracks: i32,
}

fn check_mode() {
    if psr::in_kernel_mode() {
        muon_core::halt("attempt to invoke a syscall from kernel mode");
    }
}

fn decode(frame: &Frame) -> Result<()> {
    if slot::unpack(frame.arg4) == 0 {
        Ok(())
    } else {
        Err(Error::Invalid)
    }
}

fn clamp_len(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Blocks the caller for at least `seconds` seconds.
pub fn sleep(seconds: i32) -> Result<()> {
    check_mode();
    let mut frame = Frame::new(SYS_SLEEP);
    frame.arg1 = slot::pack(seconds);
    trap(&mut frame);
    decode(&frame)
}

/// Queries a disk unit's geometry.
pub fn disk_size(unit: i32) -> Result<DiskGeometry> {
    check_mode();
    let mut frame = Frame::new(SYS_DISKSIZE);
    frame.arg1 = slot::pack(unit);
    trap(&mut frame);
    decode(&frame)?;
    Ok(DiskGeometry {
        sector_size: slot::unpack(frame.arg1),
        sectors_per_track: slot::unpack(frame.arg2),
        tracks: slot::unpack(frame.arg3),
    })
}

/// Reads `sectors` sectors into `buf`, starting at (`track`, `first`).
///
/// Returns the device status of the transfer; non-zero means the device
/// failed partway and `buf` holds whatever was read before that.
pub fn disk_read(buf: &mut [u8], unit: i32, track: i32, first: i32, sectors: i32) -> Result<i32> {
    check_mode();
    if sectors > 0 && buf.len() < sectors as usize * muon_hw::SECTOR_SIZE {
        return Err(Error::Invalid);
    }
    let mut frame = Frame::new(SYS_DISKREAD);
    frame.arg1 = buf.as_mut_ptr() as usize;
    frame.arg2 = slot::pack(sectors);
    frame.arg3 = slot::pack(track);
    frame.arg4 = slot::pack(first);
    frame.arg5 = slot::pack(unit);
    trap(&mut frame);
    decode(&frame)?;
    Ok(slot::unpack(frame.arg1))
}

/// Writes `sectors` sectors from `buf`, starting at (`track`, `first`).
///
/// Returns the device status of the transfer.
pub fn disk_write(buf: &[u8], unit: i32, track: i32, first: i32, sectors: i32) -> Result<i32> {
    check_mode();
    if sectors > 0 && buf.len() < sectors as usize * muon_hw::SECTOR_SIZE {
        return Err(Error::Invalid);
    }
    let mut frame = Frame::new(SYS_DISKWRITE);
    frame.arg1 = buf.as_ptr() as usize;
    frame.arg2 = slot::pack(sectors);
    frame.arg3 = slot::pack(track);
    frame.arg4 = slot::pack(first);
    frame.arg5 = slot::pack(unit);
    trap(&mut frame);
    decode(&frame)?;
    Ok(slot::unpack(frame.arg1))
}

/// Reads one line from a terminal into `buf`, blocking until a whole
/// line is available. Returns the number of bytes copied.
pub fn term_read(buf: &mut [u8], unit: i32) -> Result<usize> {
    check_mode();
    let mut frame = Frame::new(SYS_TERMREAD);
    frame.arg1 = buf.as_mut_ptr() as usize;
    frame.arg2 = slot::pack(clamp_len(buf.len()));
    frame.arg3 = slot::pack(unit);
    trap(&mut frame);
    decode(&frame)?;
    Ok(slot::unpack(frame.arg2) as usize)
}

/// Writes `buf` as one line to a terminal, blocking until every byte is
/// transmitted. Returns the number of bytes written.
pub fn term_write(buf: &[u8], unit: i32) -> Result<usize> {
    check_mode();
    let mut frame = Frame::new(SYS_TERMWRITE);
    frame.arg1 = buf.as_ptr() as usize;
    frame.arg2 = slot::pack(clamp_len(buf.len()));
    frame.arg3 = slot::pack(unit);
    trap(&mut frame);
    decode(&frame)?;
    Ok(slot::unpack(frame.arg2) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "kernel mode")]
    fn stubs_refuse_kernel_mode_callers() {
        psr::set(psr::Psr::CURRENT_MODE);
        let _ = sleep(1);
    }

    #[test]
    fn undersized_disk_buffer_is_rejected_before_trapping() {
        psr::set(psr::Psr::empty());
        let mut buf = [0u8; 16];
        assert_eq!(
            disk_read(&mut buf, 0, 0, 0, 1),
            Err(Error::Invalid)
        );
    }
}
