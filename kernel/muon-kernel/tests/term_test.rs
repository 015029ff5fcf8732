//! End-to-end terminal service behavior.

mod common;

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use muon_core::proc::{self, Mode};
use muon_kernel::config::MAXLINE;
use muon_user::Error;

#[test]
fn reads_deliver_whole_lines_in_order_and_then_block() {
    common::init_logging();
    let machine = common::fast_machine();
    let m = Arc::clone(&machine);
    muon_kernel::start(Arc::clone(&machine), move || {
        m.term(0).feed_input(b"hi\nworld\n");

        let mut buf = [0u8; MAXLINE];
        let n = muon_user::term_read(&mut buf, 0).unwrap();
        assert_eq!(&buf[..n], b"hi\n");
        let n = muon_user::term_read(&mut buf, 0).unwrap();
        assert_eq!(&buf[..n], b"world\n");

        // A third read blocks until another line arrives.
        let (tx, rx) = mpsc::channel();
        let third = proc::spawn("third-read", Mode::User, move || {
            let mut buf = [0u8; MAXLINE];
            let n = muon_user::term_read(&mut buf, 0).unwrap();
            tx.send(buf[..n].to_vec()).unwrap();
        });
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(50)),
            Err(mpsc::RecvTimeoutError::Timeout)
        );
        m.term(0).feed_input(b"bye\n");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), b"bye\n");
        third.join();
    });
}

#[test]
fn an_overlong_run_is_split_at_maxline() {
    common::init_logging();
    let machine = common::fast_machine();
    let m = Arc::clone(&machine);
    muon_kernel::start(Arc::clone(&machine), move || {
        let mut input = vec![b'a'; 85];
        input.push(b'\n');
        m.term(1).feed_input(&input);

        let mut buf = [0u8; MAXLINE];
        let n = muon_user::term_read(&mut buf, 1).unwrap();
        assert_eq!(n, MAXLINE);
        assert!(buf[..n].iter().all(|&ch| ch == b'a'));

        let n = muon_user::term_read(&mut buf, 1).unwrap();
        assert_eq!(&buf[..n], b"aaaaa\n");
    });
}

#[test]
fn a_short_buffer_truncates_the_delivered_line() {
    common::init_logging();
    let machine = common::fast_machine();
    let m = Arc::clone(&machine);
    muon_kernel::start(Arc::clone(&machine), move || {
        m.term(0).feed_input(b"truncated\n");
        let mut buf = [0u8; 4];
        let n = muon_user::term_read(&mut buf, 0).unwrap();
        assert_eq!(&buf[..n], b"trun");
    });
}

#[test]
fn invalid_read_and_write_arguments_are_rejected() {
    common::init_logging();
    let machine = common::fast_machine();
    muon_kernel::start(machine, || {
        let mut oversize = [0u8; MAXLINE + 1];
        assert_eq!(muon_user::term_read(&mut oversize, 0), Err(Error::Invalid));
        assert_eq!(muon_user::term_write(&oversize, 0), Err(Error::Invalid));
        let mut buf = [0u8; 8];
        assert_eq!(muon_user::term_read(&mut buf, 9), Err(Error::Invalid));
        assert_eq!(muon_user::term_read(&mut buf, -1), Err(Error::Invalid));
        assert_eq!(muon_user::term_write(&buf, 9), Err(Error::Invalid));
    });
}

#[test]
fn write_transmits_every_byte_and_reports_the_count() {
    common::init_logging();
    let machine = common::fast_machine();
    let m = Arc::clone(&machine);
    muon_kernel::start(Arc::clone(&machine), move || {
        assert_eq!(muon_user::term_write(b"hello", 0), Ok(5));
        // The last character may still be in the transmitter.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while m.term(0).output_snapshot() != b"hello" {
            assert!(std::time::Instant::now() < deadline, "output never completed");
            thread::sleep(Duration::from_millis(1));
        }
    });
}

#[test]
fn concurrent_writers_do_not_interleave() {
    common::init_logging();
    let machine = common::fast_machine();
    let m = Arc::clone(&machine);
    muon_kernel::start(Arc::clone(&machine), move || {
        let a = proc::spawn("writer-a", Mode::User, || {
            assert_eq!(muon_user::term_write(&[b'A'; 40], 2), Ok(40));
        });
        let b = proc::spawn("writer-b", Mode::User, || {
            assert_eq!(muon_user::term_write(&[b'B'; 40], 2), Ok(40));
        });
        a.join();
        b.join();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let output = loop {
            let output = m.term(2).output_snapshot();
            if output.len() == 80 {
                break output;
            }
            assert!(std::time::Instant::now() < deadline, "output never completed");
            thread::sleep(Duration::from_millis(1));
        };
        // Whole lines, either order.
        let first = output[0];
        assert!(first == b'A' || first == b'B');
        assert!(output[..40].iter().all(|&ch| ch == first));
        assert!(output[40..].iter().all(|&ch| ch != first));
    });
}

#[test]
fn reads_and_writes_on_one_unit_do_not_corrupt_each_other() {
    common::init_logging();
    let machine = common::fast_machine();
    let m = Arc::clone(&machine);
    muon_kernel::start(Arc::clone(&machine), move || {
        let reader = proc::spawn("rw-reader", Mode::User, || {
            let mut buf = [0u8; MAXLINE];
            let n = muon_user::term_read(&mut buf, 3).unwrap();
            assert_eq!(&buf[..n], b"ping\n");
        });
        m.term(3).feed_input(b"ping\n");
        assert_eq!(muon_user::term_write(b"pong", 3), Ok(4));
        reader.join();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while m.term(3).output_snapshot() != b"pong" {
            assert!(std::time::Instant::now() < deadline, "output never completed");
            thread::sleep(Duration::from_millis(1));
        }
    });
}
