//! Terminal service: driver, line-assembly reader, line-emission writer.
//!
//! Each unit runs three processes. The driver turns device interrupts
//! into per-character messages: receive statuses go to the reader,
//! transmit-ready statuses to the writer. The reader assembles characters
//! into whole lines and banks them; the writer takes one line at a time
//! from requesters and paces it out character-by-character under
//! transmit-ready interrupts.
//!
//! Writers are serialized by a one-slot pid handoff mailbox; readers and
//! writers on the same unit share nothing but the device, so they run
//! concurrently.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use arrayvec::ArrayVec;

use muon_core::sync::Mailbox;
use muon_core::{Pid, proc, psr};
use muon_hw::control::TermControl;
use muon_hw::{DeviceKind, TermDevice, control, status};

use crate::config::{MAXLINE, TERM_LINE_DEPTH, TERM_UNITS};
use crate::error::{Result, ServiceError};
use crate::start::Support;

/// A whole line in flight between processes.
///
/// At most [`MAXLINE`] bytes; a line shorter than that ends in a newline,
/// a full-length line may not.
#[derive(Debug, Clone, Copy)]
pub struct Line {
    buf: [u8; MAXLINE],
    len: usize,
}

impl Line {
    /// Builds a line from raw bytes, truncating at [`MAXLINE`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let len = bytes.len().min(MAXLINE);
        let mut buf = [0u8; MAXLINE];
        buf[..len].copy_from_slice(&bytes[..len]);
        Self { buf, len }
    }

    /// The line's bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Assembles inbound characters into lines.
///
/// A line completes when a newline arrives (newline included) or when a
/// character would not fit anymore: then the full buffer goes out as-is
/// and the triggering character starts the next line.
pub struct LineAssembler {
    acc: ArrayVec<u8, MAXLINE>,
    ready: VecDeque<Line>,
}

impl LineAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self {
            acc: ArrayVec::new(),
            ready: VecDeque::new(),
        }
    }

    /// Feeds one character.
    pub fn push(&mut self, ch: u8) {
        if self.acc.is_full() {
            self.flush();
        }
        self.acc.push(ch);
        if ch == b'\n' {
            self.flush();
        }
    }

    /// Takes the oldest completed line, if any.
    pub fn take_completed(&mut self) -> Option<Line> {
        self.ready.pop_front()
    }

    fn flush(&mut self) {
        self.ready.push_back(Line::from_bytes(&self.acc));
        self.acc.clear();
    }
}

struct CtrlShadow {
    recv_on: bool,
    xmit_on: bool,
}

/// Per-unit mailbox plumbing and control-register shadow.
pub struct TermUnit {
    /// Receive statuses, driver to reader.
    pub char_in: Mailbox<i32>,
    /// Transmit-ready statuses, driver to writer (drop-on-full fan-out).
    pub char_out: Mailbox<i32>,
    /// Completed input lines, reader to read service.
    pub lines: Mailbox<Line>,
    /// Outbound lines, write service to writer.
    pub write_lines: Mailbox<Line>,
    /// Requester pids, write service to writer; its single slot is what
    /// serializes writers on the unit.
    pub writer_pid: Mailbox<Pid>,
    /// Completed input lines counted since startup (dropped ones included).
    pub lines_buffered: AtomicU32,
    ctrl: Mutex<CtrlShadow>,
}

impl TermUnit {
    pub(crate) fn new() -> Self {
        Self {
            char_in: Mailbox::new(1),
            char_out: Mailbox::new(1),
            lines: Mailbox::new(TERM_LINE_DEPTH),
            write_lines: Mailbox::new(TERM_LINE_DEPTH),
            writer_pid: Mailbox::new(1),
            lines_buffered: AtomicU32::new(0),
            ctrl: Mutex::new(CtrlShadow {
                recv_on: false,
                xmit_on: false,
            }),
        }
    }

    fn flags(shadow: &CtrlShadow) -> TermControl {
        let mut flags = TermControl::empty();
        if shadow.recv_on {
            flags |= TermControl::RECV_INT_ENABLE;
        }
        if shadow.xmit_on {
            flags |= TermControl::XMIT_INT_ENABLE;
        }
        flags
    }

    /// Turns receive interrupts on (they stay on).
    pub fn enable_recv(&self, dev: &TermDevice) {
        let mut shadow = self.ctrl.lock().unwrap();
        shadow.recv_on = true;
        dev.write_control(Self::flags(&shadow).bits());
    }

    /// Turns transmit-ready interrupts on or off.
    fn set_xmit(&self, dev: &TermDevice, on: bool) {
        let mut shadow = self.ctrl.lock().unwrap();
        shadow.xmit_on = on;
        dev.write_control(Self::flags(&shadow).bits());
    }

    /// Loads one character into the transmitter.
    fn send_char(&self, dev: &TermDevice, ch: u8) {
        let shadow = self.ctrl.lock().unwrap();
        dev.write_control(control::with_char(
            Self::flags(&shadow) | TermControl::XMIT_CHAR,
            ch,
        ));
    }
}

/// Terminal driver for one unit: fans device statuses out to the helpers.
///
/// Character arrivals are never dropped (blocking send to the reader);
/// transmit-ready statuses are a stateless level signal, so the fan-out
/// drops them when the writer is not keeping up.
pub fn term_driver(support: Arc<Support>, unit: usize) {
    support.sem_running.release();
    psr::enable_interrupts();

    loop {
        let word = match support.machine.wait_device(DeviceKind::Terminal, unit) {
            Ok(word) => word,
            Err(_) => break,
        };
        if status::recv(word) == status::RECV_CHAR {
            support.terms[unit].char_in.send(word);
        }
        if status::xmit(word) == status::XMIT_READY {
            support.terms[unit].char_out.cond_send(word);
        }
    }
    log::debug!(target: "muon::term", "unit {unit}: driver exiting");
}

/// Terminal reader for one unit: assembles characters into lines.
pub fn term_reader(support: Arc<Support>, unit: usize) {
    support.sem_running.release();
    let mut assembler = LineAssembler::new();

    loop {
        let word = support.terms[unit].char_in.recv();
        if proc::is_zapped() {
            break;
        }
        assembler.push(status::chr(word));
        while let Some(line) = assembler.take_completed() {
            if !support.terms[unit].lines.cond_send(line) {
                log::debug!(target: "muon::term", "unit {unit}: line buffer full, line dropped");
            }
            support.terms[unit].lines_buffered.fetch_add(1, Ordering::Relaxed);
        }
    }
    log::debug!(target: "muon::term", "unit {unit}: reader exiting");
}

/// Terminal writer for one unit: transmits queued lines one character per
/// transmit-ready interrupt, then releases the requester with the count.
pub fn term_writer(support: Arc<Support>, unit: usize) {
    support.sem_running.release();

    loop {
        let line = support.terms[unit].write_lines.recv();
        if proc::is_zapped() {
            break;
        }
        let dev = support.machine.term(unit);
        support.terms[unit].set_xmit(dev, true);
        let mut count = 0i32;
        for &ch in line.as_bytes() {
            support.terms[unit].char_out.recv();
            support.terms[unit].send_char(dev, ch);
            count += 1;
        }
        support.terms[unit].set_xmit(dev, false);

        let pid = support.terms[unit].writer_pid.recv();
        support.table.slot_of(pid).mbox.send(count);
    }
    log::debug!(target: "muon::term", "unit {unit}: writer exiting");
}

/// Kernel-mode implementation of the terminal-read service.
///
/// Enables receive interrupts, blocks for one whole line, and copies up
/// to `size` bytes of it, stopping at the first NUL.
pub fn term_read_real(support: &Support, buf: &mut [u8], size: i32, unit: i32) -> Result<i32> {
    validate(size, unit)?;
    let unit = unit as usize;

    support.terms[unit].enable_recv(support.machine.term(unit));
    let line = support.terms[unit].lines.recv();

    let mut n = 0usize;
    for &ch in line.as_bytes() {
        if n >= size as usize || ch == 0 {
            break;
        }
        buf[n] = ch;
        n += 1;
    }
    Ok(n as i32)
}

/// Kernel-mode implementation of the terminal-write service.
///
/// Hands the writer its pid and the line, then blocks until the writer
/// reports how many bytes went out.
pub fn term_write_real(support: &Support, buf: &[u8], size: i32, unit: i32) -> Result<i32> {
    validate(size, unit)?;
    let unit = unit as usize;
    let pid = proc::current_pid();

    support.terms[unit].writer_pid.send(pid);
    support.terms[unit].write_lines.send(Line::from_bytes(&buf[..size as usize]));
    let count = support.table.slot_of(pid).mbox.recv();
    Ok(count)
}

fn validate(size: i32, unit: i32) -> Result<()> {
    if size < 0 || size as usize > MAXLINE || unit < 0 || unit as usize >= TERM_UNITS {
        return Err(ServiceError::InvalidArgument);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut LineAssembler, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for &ch in bytes {
            assembler.push(ch);
            while let Some(line) = assembler.take_completed() {
                out.push(line.as_bytes().to_vec());
            }
        }
        out
    }

    #[test]
    fn newline_completes_a_line_and_is_included() {
        let mut assembler = LineAssembler::new();
        let lines = feed(&mut assembler, b"hi\nworld\n");
        assert_eq!(lines, vec![b"hi\n".to_vec(), b"world\n".to_vec()]);
    }

    #[test]
    fn overlong_run_splits_at_maxline_without_newline() {
        let mut assembler = LineAssembler::new();
        let mut input = vec![b'a'; 85];
        input.push(b'\n');
        let lines = feed(&mut assembler, &input);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], vec![b'a'; MAXLINE]);
        let mut tail = vec![b'a'; 5];
        tail.push(b'\n');
        assert_eq!(lines[1], tail);
    }

    #[test]
    fn exactly_maxline_then_newline_yields_full_line_and_bare_newline() {
        let mut assembler = LineAssembler::new();
        let mut input = vec![b'x'; MAXLINE];
        input.push(b'\n');
        let lines = feed(&mut assembler, &input);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), MAXLINE);
        assert_eq!(lines[1], b"\n".to_vec());
    }

    #[test]
    fn partial_line_stays_buffered() {
        let mut assembler = LineAssembler::new();
        assert!(feed(&mut assembler, b"pending").is_empty());
        let lines = feed(&mut assembler, b"\n");
        assert_eq!(lines, vec![b"pending\n".to_vec()]);
    }

    #[test]
    fn line_truncates_at_maxline() {
        let long = vec![b'z'; MAXLINE + 20];
        let line = Line::from_bytes(&long);
        assert_eq!(line.as_bytes().len(), MAXLINE);
    }
}
