//! End-to-end scenarios exercising whole send/receive/close sequences
//! across real OS threads, as opposed to the single-threaded unit tests
//! living next to the implementation.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use rand::Rng;
use rendezchan::{bounded, unbounded, RecvError, SendError, TryRecvError, TrySendError};

#[test]
fn rendezvous_handoff_is_a_direct_transfer() {
    let (tx, rx) = bounded(0).unwrap();
    let receiver = thread::spawn(move || rx.recv());

    // Give the receiver a moment to actually park before we send, so this
    // exercises the "sender arrives after receiver" ordering as well as
    // the reverse.
    thread::sleep(Duration::from_millis(20));
    tx.send(99).unwrap();

    assert_eq!(receiver.join().unwrap(), Ok(99));
}

#[test]
fn buffered_channel_wraps_around_and_keeps_fifo_order() {
    let (tx, rx) = bounded(3).unwrap();
    for i in 0..3 {
        tx.try_send(i).unwrap();
    }
    assert_eq!(rx.try_recv(), Ok(0));
    tx.try_send(3).unwrap(); // wraps the ring buffer
    assert_eq!(rx.try_recv(), Ok(1));
    assert_eq!(rx.try_recv(), Ok(2));
    assert_eq!(rx.try_recv(), Ok(3));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn try_send_rejects_then_succeeds_once_a_slot_opens() {
    let (tx, rx) = bounded(1).unwrap();
    tx.try_send(1).unwrap();
    assert!(matches!(tx.try_send(2), Err(TrySendError::Full(2))));
    assert_eq!(rx.try_recv(), Ok(1));
    tx.try_send(2).unwrap();
    assert_eq!(rx.try_recv(), Ok(2));
}

#[test]
fn closed_empty_channel_reports_disconnected_without_blocking() {
    let (tx, rx) = unbounded::<i32>();
    tx.close().unwrap();
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    assert_eq!(rx.recv(), Err(RecvError));
}

#[test]
fn send_then_close_then_drain_then_disconnected() {
    let (tx, rx) = bounded(4).unwrap();
    tx.try_send(1).unwrap();
    tx.try_send(2).unwrap();
    tx.close().unwrap();

    // The buffered values are still delivered after close.
    assert_eq!(rx.recv(), Ok(1));
    assert_eq!(rx.recv(), Ok(2));
    // Only once the buffer is empty does recv report the channel gone.
    assert_eq!(rx.recv(), Err(RecvError));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
}

#[test]
fn many_senders_fan_in_without_losing_or_duplicating_values() {
    const SENDERS: i32 = 6;
    const PER_SENDER: i32 = 500;

    let (tx, rx) = bounded(16).unwrap();
    let handles: Vec<_> = (0..SENDERS)
        .map(|s| {
            let tx = tx.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for i in 0..PER_SENDER {
                    if rng.gen_bool(0.1) {
                        thread::yield_now();
                    }
                    tx.send(s * PER_SENDER + i).unwrap();
                }
            })
        })
        .collect();
    drop(tx);

    let received: HashSet<i32> = rx.iter().collect();
    for h in handles {
        h.join().unwrap();
    }

    let expected: HashSet<i32> = (0..SENDERS * PER_SENDER).collect();
    assert_eq!(received, expected);
}

#[test]
fn closing_while_multiple_senders_are_parked_wakes_every_one() {
    let (tx, rx) = bounded::<i32>(0).unwrap();
    let senders: Vec<_> = (0..4)
        .map(|i| {
            let tx = tx.clone();
            thread::spawn(move || tx.send(i))
        })
        .collect();
    drop(tx);
    thread::sleep(Duration::from_millis(30));
    rx.close().unwrap();

    let mut failures = 0;
    for s in senders {
        if let Err(SendError(_)) = s.join().unwrap() {
            failures += 1;
        }
    }
    assert_eq!(failures, 4);
}

#[test]
fn multiple_receivers_each_get_a_distinct_value() {
    let (tx, rx) = unbounded();
    for i in 0..8 {
        tx.send(i).unwrap();
    }
    drop(tx);

    let receivers: Vec<_> = (0..4)
        .map(|_| {
            let rx = rx.clone();
            thread::spawn(move || {
                let mut got = Vec::new();
                while let Ok(v) = rx.recv() {
                    got.push(v);
                }
                got
            })
        })
        .collect();
    drop(rx);

    let mut all: Vec<i32> = receivers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..8).collect::<Vec<_>>());
}
