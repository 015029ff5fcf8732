//! End-to-end sleep service behavior.

mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use muon_core::proc::{self, Mode};

#[test]
fn sleepers_wake_in_deadline_order_and_not_early() {
    common::init_logging();
    // 20x time compression: a generous margin between the wall time the
    // second sleeper needs to get going and the first sleeper's deadline.
    let mut config = common::fast_config();
    config.clock.us_per_tick = 20_000;
    let machine = muon_hw::Machine::start(config);

    // (who, simulated wake time) in completion order.
    let wakeups: Arc<Mutex<Vec<(char, u64)>>> = Arc::new(Mutex::new(Vec::new()));

    let m = Arc::clone(&machine);
    let log = Arc::clone(&wakeups);
    muon_kernel::start(Arc::clone(&machine), move || {
        let (m_a, log_a) = (Arc::clone(&m), Arc::clone(&log));
        let a = proc::spawn("sleeper-a", Mode::User, move || {
            assert_eq!(muon_user::sleep(2), Ok(()));
            log_a.lock().unwrap().push(('a', m_a.now_us()));
        });

        // B starts about a tenth of a simulated second later.
        while m.now_us() < 100_000 {
            thread::sleep(Duration::from_millis(1));
        }
        let (m_b, log_b) = (Arc::clone(&m), Arc::clone(&log));
        let b = proc::spawn("sleeper-b", Mode::User, move || {
            assert_eq!(muon_user::sleep(1), Ok(()));
            log_b.lock().unwrap().push(('b', m_b.now_us()));
        });

        a.join();
        b.join();
    });

    let wakeups = wakeups.lock().unwrap();
    assert_eq!(wakeups.len(), 2);
    assert_eq!(wakeups[0].0, 'b');
    assert_eq!(wakeups[1].0, 'a');
    // Each wakeup happened at or after its deadline.
    assert!(wakeups[0].1 >= 1_100_000, "b woke at {}us", wakeups[0].1);
    assert!(wakeups[1].1 >= 2_000_000, "a woke at {}us", wakeups[1].1);
}

#[test]
fn negative_seconds_is_invalid() {
    common::init_logging();
    let machine = common::fast_machine();
    muon_kernel::start(machine, || {
        assert_eq!(muon_user::sleep(-1), Err(muon_user::Error::Invalid));
    });
}

#[test]
fn zero_seconds_returns_on_the_next_tick() {
    common::init_logging();
    let machine = common::fast_machine();
    muon_kernel::start(machine, || {
        assert_eq!(muon_user::sleep(0), Ok(()));
    });
}

#[test]
fn many_sleepers_with_equal_deadlines_all_wake() {
    common::init_logging();
    let machine = common::fast_machine();
    muon_kernel::start(machine, || {
        let sleepers: Vec<_> = (0..8)
            .map(|i| {
                proc::spawn(&format!("sleeper-{i}"), Mode::User, || {
                    assert_eq!(muon_user::sleep(1), Ok(()));
                })
            })
            .collect();
        for sleeper in sleepers {
            sleeper.join();
        }
    });
}
