//! Per-process processor status register.
//!
//! Each process carries a PSR with a current-mode bit (set = kernel mode)
//! and an interrupt-enable bit. The trap path raises the mode bit on
//! entry; syscall handlers drop it before returning to the caller. The
//! register is thread-local because a process never inspects another
//! process's PSR.

use std::cell::Cell;

use bitflags::bitflags;

bitflags! {
    /// Processor status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Psr: u32 {
        /// Current mode: set = kernel, clear = user.
        const CURRENT_MODE = 1 << 0;
        /// Current interrupt-enable.
        const CURRENT_INT = 1 << 1;
    }
}

thread_local! {
    static PSR: Cell<Psr> = const { Cell::new(Psr::empty()) };
}

/// Reads the current process's PSR.
pub fn get() -> Psr {
    PSR.with(Cell::get)
}

/// Overwrites the current process's PSR.
pub fn set(psr: Psr) {
    PSR.with(|p| p.set(psr));
}

/// Returns whether the current process runs in kernel mode.
pub fn in_kernel_mode() -> bool {
    get().contains(Psr::CURRENT_MODE)
}

/// Raises the current-mode bit (entering kernel mode).
pub fn enter_kernel_mode() {
    set(get() | Psr::CURRENT_MODE);
}

/// Clears the current-mode bit (returning to user mode).
pub fn enter_user_mode() {
    set(get() - Psr::CURRENT_MODE);
}

/// Sets the interrupt-enable bit.
///
/// Drivers do this once after signalling readiness; on the simulated
/// machine interrupt delivery does not actually depend on it, but the
/// drivers keep the discipline.
pub fn enable_interrupts() {
    set(get() | Psr::CURRENT_INT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_transitions() {
        set(Psr::empty());
        assert!(!in_kernel_mode());
        enter_kernel_mode();
        assert!(in_kernel_mode());
        enter_user_mode();
        assert!(!in_kernel_mode());
    }

    #[test]
    fn interrupt_bit_is_independent_of_mode() {
        set(Psr::empty());
        enable_interrupts();
        assert!(get().contains(Psr::CURRENT_INT));
        enter_kernel_mode();
        enter_user_mode();
        assert!(get().contains(Psr::CURRENT_INT));
    }

    #[test]
    fn psr_is_thread_local() {
        set(Psr::CURRENT_MODE);
        std::thread::spawn(|| {
            assert!(!in_kernel_mode());
        })
        .join()
        .unwrap();
        assert!(in_kernel_mode());
    }
}
