//! Terminal device.
//!
//! A terminal moves one character per tick in each direction. Received
//! characters come from a scripted input queue; transmitted characters
//! land in a captured output buffer. Each tick the device composes a
//! status word — receive side, transmit side, and the received character
//! — and raises an interrupt if either enabled side has something to
//! report.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use muon_core::sync::Mailbox;

/// Control-word encoding: low bits are flags, bits 8..16 carry the
/// character to transmit.
pub mod control {
    use bitflags::bitflags;

    bitflags! {
        /// Terminal control flags.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct TermControl: i32 {
            /// A character to transmit sits in bits 8..16.
            const XMIT_CHAR = 1 << 0;
            /// Deliver receive-side interrupts.
            const RECV_INT_ENABLE = 1 << 1;
            /// Deliver transmit-side interrupts.
            const XMIT_INT_ENABLE = 1 << 2;
        }
    }

    /// Composes a control word from flags and a character.
    pub fn with_char(flags: TermControl, ch: u8) -> i32 {
        flags.bits() | (i32::from(ch) << 8)
    }
}

/// Status-word encoding: bits 0..2 receive status, bits 2..4 transmit
/// status, bits 8..16 the received character.
pub mod status {
    /// Receive side: a new character is ready in bits 8..16.
    pub const RECV_CHAR: i32 = 1;
    /// Transmit side: the transmitter is idle.
    pub const XMIT_READY: i32 = 1;

    /// Extracts the receive-status field.
    pub fn recv(word: i32) -> i32 {
        word & 0x3
    }

    /// Extracts the transmit-status field.
    pub fn xmit(word: i32) -> i32 {
        (word >> 2) & 0x3
    }

    /// Extracts the received character.
    pub fn chr(word: i32) -> u8 {
        (word >> 8) as u8
    }

    pub(crate) fn compose(recv_char: Option<u8>, xmit_ready: bool) -> i32 {
        let mut word = 0;
        if let Some(ch) = recv_char {
            word |= RECV_CHAR | (i32::from(ch) << 8);
        }
        if xmit_ready {
            word |= XMIT_READY << 2;
        }
        word
    }
}

/// Terminal timing.
#[derive(Debug, Clone)]
pub struct TermConfig {
    /// Wall-clock length of one character time.
    pub tick: Duration,
}

impl Default for TermConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(2),
        }
    }
}

/// Characters' worth of status interrupts buffered before drops.
const TERM_INT_DEPTH: usize = 64;

struct TermState {
    recv_int: bool,
    xmit_int: bool,
    pending_xmit: Option<u8>,
    input: VecDeque<u8>,
    output: Vec<u8>,
}

/// A simulated terminal unit.
pub struct TermDevice {
    tick: Duration,
    state: Mutex<TermState>,
    pub(crate) int: Mailbox<i32>,
}

impl TermDevice {
    pub(crate) fn new(cfg: TermConfig) -> Self {
        Self {
            tick: cfg.tick,
            state: Mutex::new(TermState {
                recv_int: false,
                xmit_int: false,
                pending_xmit: None,
                input: VecDeque::new(),
                output: Vec::new(),
            }),
            int: Mailbox::new(TERM_INT_DEPTH),
        }
    }

    /// Writes the control register.
    ///
    /// Interrupt-enable bits take effect at the next tick. A control word
    /// with [`control::TermControl::XMIT_CHAR`] loads the transmitter;
    /// loading it while busy overwrites the untransmitted character, so
    /// the driver must pace itself by transmit-ready interrupts.
    pub fn write_control(&self, word: i32) {
        let flags = control::TermControl::from_bits_truncate(word);
        let mut state = self.state.lock().unwrap();
        state.recv_int = flags.contains(control::TermControl::RECV_INT_ENABLE);
        state.xmit_int = flags.contains(control::TermControl::XMIT_INT_ENABLE);
        if flags.contains(control::TermControl::XMIT_CHAR) {
            state.pending_xmit = Some((word >> 8) as u8);
        }
    }

    /// Appends bytes to the scripted input (the "terminal input file").
    pub fn feed_input(&self, bytes: &[u8]) {
        self.state.lock().unwrap().input.extend(bytes);
    }

    /// Snapshot of everything transmitted so far.
    pub fn output_snapshot(&self) -> Vec<u8> {
        self.state.lock().unwrap().output.clone()
    }

    /// Device thread: one status interrupt per eventful tick.
    pub(crate) fn run(&self, running: &AtomicBool) {
        while running.load(Ordering::Acquire) {
            std::thread::sleep(self.tick);
            let word = {
                let mut state = self.state.lock().unwrap();
                let recv_char = if state.recv_int {
                    state.input.pop_front()
                } else {
                    None
                };
                if let Some(ch) = state.pending_xmit.take() {
                    state.output.push(ch);
                }
                let xmit_ready = state.xmit_int && state.pending_xmit.is_none();
                status::compose(recv_char, xmit_ready)
            };
            if word != 0 {
                self.int.cond_send(word);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn start(cfg: TermConfig) -> (Arc<TermDevice>, Arc<AtomicBool>, thread::JoinHandle<()>) {
        let dev = Arc::new(TermDevice::new(cfg));
        let running = Arc::new(AtomicBool::new(true));
        let (runner, flag) = (Arc::clone(&dev), Arc::clone(&running));
        let handle = thread::spawn(move || runner.run(&flag));
        (dev, running, handle)
    }

    fn stop(running: &AtomicBool, handle: thread::JoinHandle<()>) {
        running.store(false, Ordering::Release);
        handle.join().unwrap();
    }

    #[test]
    fn silent_until_interrupts_enabled() {
        let (dev, running, handle) = start(TermConfig::default());
        dev.feed_input(b"x");
        thread::sleep(Duration::from_millis(20));
        // The first interrupt after enabling still carries 'x': the device
        // held the character while receive interrupts were off.
        dev.write_control(control::TermControl::RECV_INT_ENABLE.bits());
        let word = dev.int.recv();
        assert_eq!(status::recv(word), status::RECV_CHAR);
        assert_eq!(status::chr(word), b'x');
        stop(&running, handle);
    }

    #[test]
    fn delivers_input_one_char_per_interrupt() {
        let (dev, running, handle) = start(TermConfig::default());
        dev.write_control(control::TermControl::RECV_INT_ENABLE.bits());
        dev.feed_input(b"hi");
        let first = dev.int.recv();
        let second = dev.int.recv();
        assert_eq!(status::chr(first), b'h');
        assert_eq!(status::chr(second), b'i');
        stop(&running, handle);
    }

    #[test]
    fn transmit_captures_output_and_reports_ready() {
        let (dev, running, handle) = start(TermConfig::default());
        dev.write_control(control::TermControl::XMIT_INT_ENABLE.bits());
        let word = dev.int.recv();
        assert_eq!(status::xmit(word), status::XMIT_READY);
        dev.write_control(control::with_char(
            control::TermControl::XMIT_CHAR | control::TermControl::XMIT_INT_ENABLE,
            b'A',
        ));
        // Next ready interrupt means the character went out.
        loop {
            let word = dev.int.recv();
            if status::xmit(word) == status::XMIT_READY && !dev.output_snapshot().is_empty() {
                break;
            }
        }
        assert_eq!(dev.output_snapshot(), b"A");
        stop(&running, handle);
    }
}
