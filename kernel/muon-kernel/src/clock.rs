//! Clock driver process.

use std::sync::Arc;

use muon_core::{proc, psr};
use muon_hw::DeviceKind;

use crate::start::Support;

/// Clock driver: wakes sleepers whose deadline has elapsed.
///
/// Runs until zapped. Wakeups use conditional send; the one-slot private
/// mailbox holds the token if the sleeper has not reached its receive
/// yet, so a wakeup is never lost. On the way out, every process still on
/// the sleep list is released unconditionally.
pub fn clock_driver(support: Arc<Support>) {
    support.sem_running.release();
    psr::enable_interrupts();

    while !proc::is_zapped() {
        if support.machine.wait_device(DeviceKind::Clock, 0).is_err() {
            break;
        }
        let now_us = support.machine.now_us();
        while let Some(idx) = support.sleepers.pop_due(now_us) {
            log::trace!(target: "muon::clock", "waking slot {idx} at {now_us}us");
            support.table.slot(idx).mbox.cond_send(0);
        }
    }

    for idx in support.sleepers.drain() {
        support.table.slot(idx).mbox.send(0);
    }
    log::debug!(target: "muon::clock", "clock driver exiting");
}
