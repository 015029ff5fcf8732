//! Blocking synchronization primitives.

mod mailbox;
mod semaphore;

pub use mailbox::Mailbox;
pub use semaphore::Semaphore;
