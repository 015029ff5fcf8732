//! Bounded message mailbox.
//!
//! [`Mailbox`] is the rendezvous primitive of the support layer: a
//! fixed-capacity typed channel with blocking [`send`](Mailbox::send) /
//! [`recv`](Mailbox::recv) and a conditional send that drops the message
//! instead of blocking. A capacity of zero makes the mailbox a pure
//! rendezvous point: senders and receivers pair up one-to-one and neither
//! side proceeds until the handoff happened.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// A bounded, multi-producer multi-consumer mailbox.
pub struct Mailbox<T> {
    inner: Mutex<Inner<T>>,
    /// Signalled when a message (or a rendezvous slot) becomes readable.
    readable: Condvar,
    /// Signalled when buffer space frees up, a receiver arrives, or a
    /// rendezvous slot is consumed.
    writable: Condvar,
    capacity: usize,
}

struct Inner<T> {
    queue: VecDeque<T>,
    /// In-flight rendezvous message (capacity 0 only).
    slot: Option<T>,
    /// Receivers currently blocked in `recv` (capacity 0 only).
    receivers: usize,
}

impl<T> Mailbox<T> {
    /// Creates a mailbox buffering up to `capacity` messages.
    ///
    /// `capacity == 0` creates a rendezvous mailbox.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                slot: None,
                receivers: 0,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            capacity,
        }
    }

    /// Sends a message, blocking while the mailbox is full (or, on a
    /// rendezvous mailbox, until a receiver has taken the message).
    pub fn send(&self, msg: T) {
        let mut inner = self.inner.lock().unwrap();
        if self.capacity == 0 {
            while inner.receivers == 0 || inner.slot.is_some() {
                inner = self.writable.wait(inner).unwrap();
            }
            inner.slot = Some(msg);
            self.readable.notify_one();
            while inner.slot.is_some() {
                inner = self.writable.wait(inner).unwrap();
            }
        } else {
            while inner.queue.len() >= self.capacity {
                inner = self.writable.wait(inner).unwrap();
            }
            inner.queue.push_back(msg);
            self.readable.notify_one();
        }
    }

    /// Sends without blocking.
    ///
    /// Returns `false` and drops `msg` if the send would block: the buffer
    /// is full, or no receiver is waiting at a rendezvous mailbox.
    pub fn cond_send(&self, msg: T) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if self.capacity == 0 {
            if inner.receivers == 0 || inner.slot.is_some() {
                return false;
            }
            inner.slot = Some(msg);
            self.readable.notify_one();
            true
        } else {
            if inner.queue.len() >= self.capacity {
                return false;
            }
            inner.queue.push_back(msg);
            self.readable.notify_one();
            true
        }
    }

    /// Receives a message, blocking while the mailbox is empty.
    pub fn recv(&self) -> T {
        let mut inner = self.inner.lock().unwrap();
        if self.capacity == 0 {
            inner.receivers += 1;
            self.writable.notify_all();
            loop {
                if let Some(msg) = inner.slot.take() {
                    inner.receivers -= 1;
                    self.writable.notify_all();
                    return msg;
                }
                inner = self.readable.wait(inner).unwrap();
            }
        } else {
            loop {
                if let Some(msg) = inner.queue.pop_front() {
                    self.writable.notify_all();
                    return msg;
                }
                inner = self.readable.wait(inner).unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn bounded_buffers_up_to_capacity() {
        let mbox = Mailbox::new(2);
        assert!(mbox.cond_send(1));
        assert!(mbox.cond_send(2));
        assert!(!mbox.cond_send(3));
        assert_eq!(mbox.recv(), 1);
        assert!(mbox.cond_send(3));
        assert_eq!(mbox.recv(), 2);
        assert_eq!(mbox.recv(), 3);
    }

    #[test]
    fn cond_send_to_one_slot_box_buffers_before_receiver_blocks() {
        // The private-mailbox wakeup pattern: the token may be sent before
        // the sleeper reaches recv and must not be lost.
        let mbox = Mailbox::new(1);
        assert!(mbox.cond_send(7));
        assert_eq!(mbox.recv(), 7);
    }

    #[test]
    fn rendezvous_cond_send_drops_without_receiver() {
        let mbox: Mailbox<i32> = Mailbox::new(0);
        assert!(!mbox.cond_send(1));
    }

    #[test]
    fn rendezvous_pairs_sender_and_receiver() {
        let mbox = Arc::new(Mailbox::new(0));
        let tx = Arc::clone(&mbox);
        let sender = thread::spawn(move || tx.send(42));
        assert_eq!(mbox.recv(), 42);
        sender.join().unwrap();
    }

    #[test]
    fn rendezvous_cond_send_reaches_waiting_receiver() {
        let mbox = Arc::new(Mailbox::new(0));
        let rx = Arc::clone(&mbox);
        let receiver = thread::spawn(move || rx.recv());
        // Give the receiver time to block, then offer.
        let mut sent = false;
        for _ in 0..200 {
            if mbox.cond_send(9) {
                sent = true;
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(sent);
        assert_eq!(receiver.join().unwrap(), 9);
    }

    #[test]
    fn blocked_sender_resumes_when_space_frees() {
        let mbox = Arc::new(Mailbox::new(1));
        mbox.send(1);
        let tx = Arc::clone(&mbox);
        let sender = thread::spawn(move || tx.send(2));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(mbox.recv(), 1);
        sender.join().unwrap();
        assert_eq!(mbox.recv(), 2);
    }

    #[test]
    fn messages_keep_fifo_order() {
        let mbox = Mailbox::new(10);
        for i in 0..10 {
            mbox.send(i);
        }
        for i in 0..10 {
            assert_eq!(mbox.recv(), i);
        }
    }
}
