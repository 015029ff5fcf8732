//! Process management.
//!
//! A process is a named thread with a [`Pid`], an initial CPU mode, and a
//! cooperative termination flag. [`zap`](ProcHandle::zap) never kills a
//! process; it marks it, and the process exits at its next [`is_zapped`]
//! poll. Whoever zaps a blocked process is responsible for waking it so
//! the flag can be observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use crate::Pid;
use crate::psr::{self, Psr};

/// Next PID to assign.
static NEXT_PID: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static CURRENT: std::cell::RefCell<Option<Arc<ProcShared>>> =
        const { std::cell::RefCell::new(None) };
}

/// CPU mode a process starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Driver and service processes.
    Kernel,
    /// Processes that reach the support layer through syscalls only.
    User,
}

/// State shared between a process's thread and its handle.
struct ProcShared {
    pid: Pid,
    name: String,
    zapped: AtomicBool,
}

/// Owning handle to a spawned process.
pub struct ProcHandle {
    shared: Arc<ProcShared>,
    join: thread::JoinHandle<()>,
}

impl ProcHandle {
    /// Returns the process's pid.
    pub fn pid(&self) -> Pid {
        self.shared.pid
    }

    /// Marks the process for cooperative termination.
    ///
    /// The target only notices at its next [`is_zapped`] poll; callers
    /// must wake it if it is blocked.
    pub fn zap(&self) {
        log::trace!(target: "muon::proc", "zap {} ({})", self.shared.pid, self.shared.name);
        self.shared.zapped.store(true, Ordering::Release);
    }

    /// Waits for the process to exit.
    pub fn join(self) {
        let name = self.shared.name.clone();
        if self.join.join().is_err() {
            crate::halt(&format!("process {name} panicked"));
        }
    }
}

/// Spawns a process running `f` in the given initial mode.
pub fn spawn(name: &str, mode: Mode, f: impl FnOnce() + Send + 'static) -> ProcHandle {
    let pid = Pid::new(NEXT_PID.fetch_add(1, Ordering::Relaxed));
    let shared = Arc::new(ProcShared {
        pid,
        name: name.to_owned(),
        zapped: AtomicBool::new(false),
    });
    let thread_shared = Arc::clone(&shared);
    let join = thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            CURRENT.with(|c| *c.borrow_mut() = Some(thread_shared));
            psr::set(match mode {
                Mode::Kernel => Psr::CURRENT_MODE,
                Mode::User => Psr::empty(),
            });
            f();
        })
        .expect("spawn: OS refused a thread");
    ProcHandle { shared, join }
}

/// Returns the calling process's pid.
///
/// Halts if the calling thread is not a process; only process threads may
/// use the support layer.
pub fn current_pid() -> Pid {
    CURRENT.with(|c| match &*c.borrow() {
        Some(shared) => shared.pid,
        None => crate::halt("current_pid: calling thread is not a process"),
    })
}

/// Returns whether the calling process has been zapped.
pub fn is_zapped() -> bool {
    CURRENT.with(|c| match &*c.borrow() {
        Some(shared) => shared.zapped.load(Ordering::Acquire),
        None => false,
    })
}
