/*!
A typed, in-process channel for handing values between threads.

A channel is created with [`bounded`] (a fixed-size buffer, or a rendezvous
channel if the capacity is `0`) or [`unbounded`] (no buffer limit; `send`
never blocks). Both return a [`Sender`]/[`Receiver`] pair backed by the same
queue; either half may be cloned to give multiple producers or multiple
consumers, and the channel closes itself once every `Sender` clone has been
dropped.

```
let (tx, rx) = rendezchan::bounded(1).unwrap();
tx.send("hello").unwrap();
assert_eq!(rx.recv().unwrap(), "hello");
```

Dropping every `Sender` closes the channel automatically; a receiver drains
whatever was already buffered before it starts reporting [`RecvError`]:

```
let (tx, rx) = rendezchan::unbounded();
tx.send(1).unwrap();
drop(tx);
assert_eq!(rx.recv(), Ok(1));
assert!(rx.recv().is_err());
```
*/

mod buffer;
mod channel;
mod error;
mod waiter;

pub use channel::{bounded, unbounded, IntoIter, Iter, Receiver, Sender, TryIter};
pub use error::{
    CloseError, ConstructError, RecvError, RecvTimeoutError, SendError, SendTimeoutError,
    TryRecvError, TrySendError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn rendezvous_handoff_requires_a_receiver() {
        let (tx, rx) = bounded::<i32>(0).unwrap();
        let t = thread::spawn(move || tx.send(42).unwrap());
        assert_eq!(rx.recv().unwrap(), 42);
        t.join().unwrap();
    }

    #[test]
    fn rendezvous_try_send_fails_without_a_waiting_receiver() {
        let (tx, _rx) = bounded::<i32>(0).unwrap();
        assert!(matches!(tx.try_send(1), Err(TrySendError::Full(1))));
    }

    #[test]
    fn buffered_send_recv_preserves_fifo_order() {
        let (tx, rx) = bounded(4).unwrap();
        for i in 0..4 {
            tx.try_send(i).unwrap();
        }
        assert!(matches!(tx.try_send(99), Err(TrySendError::Full(99))));
        for i in 0..4 {
            assert_eq!(rx.try_recv().unwrap(), i);
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn unbounded_send_never_blocks() {
        let (tx, rx) = unbounded();
        for i in 0..10_000 {
            tx.send(i).unwrap();
        }
        for i in 0..10_000 {
            assert_eq!(rx.recv().unwrap(), i);
        }
    }

    #[test]
    fn closing_wakes_a_blocked_receiver() {
        let (tx, rx) = bounded::<i32>(0).unwrap();
        let t = thread::spawn(move || rx.recv());
        thread::sleep(Duration::from_millis(20));
        tx.close().unwrap();
        assert_eq!(t.join().unwrap(), Err(RecvError));
    }

    #[test]
    fn closing_wakes_a_blocked_sender_and_returns_its_value() {
        let (tx, rx) = bounded::<i32>(0).unwrap();
        let t = thread::spawn(move || tx.send(7));
        thread::sleep(Duration::from_millis(20));
        rx.close().unwrap();
        assert_eq!(t.join().unwrap(), Err(SendError(7)));
    }

    #[test]
    fn closed_channel_still_drains_its_buffer() {
        let (tx, rx) = bounded(2).unwrap();
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        tx.close().unwrap();
        assert_eq!(rx.recv(), Ok(1));
        assert_eq!(rx.recv(), Ok(2));
        assert_eq!(rx.recv(), Err(RecvError));
    }

    #[test]
    fn double_close_reports_already_closed() {
        let (tx, _rx) = unbounded::<i32>();
        tx.close().unwrap();
        assert_eq!(tx.close(), Err(CloseError));
    }

    #[test]
    fn dropping_the_last_sender_closes_the_channel() {
        let (tx, rx) = unbounded::<i32>();
        let tx2 = tx.clone();
        drop(tx);
        assert!(!rx.is_closed());
        drop(tx2);
        assert!(rx.is_closed());
        assert_eq!(rx.recv(), Err(RecvError));
    }

    #[test]
    fn send_timeout_returns_the_value_on_expiry() {
        let (tx, _rx) = bounded::<i32>(0).unwrap();
        match tx.send_timeout(5, Duration::from_millis(10)) {
            Err(SendTimeoutError::Timeout(5)) => {}
            other => panic!("expected Timeout(5), got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn recv_timeout_expires_on_an_empty_open_channel() {
        let (_tx, rx) = unbounded::<i32>();
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[test]
    fn many_senders_fan_in_without_losing_or_duplicating_values() {
        let (tx, rx) = bounded(8).unwrap();
        let senders: Vec<_> = (0..4)
            .map(|n| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        tx.send(n * 100 + i).unwrap();
                    }
                })
            })
            .collect();
        drop(tx);
        let mut received: Vec<i32> = rx.iter().collect();
        for s in senders {
            s.join().unwrap();
        }
        received.sort_unstable();
        let mut expected: Vec<i32> = (0..400).collect();
        expected.sort_unstable();
        assert_eq!(received, expected);
    }

    #[test]
    fn try_iter_stops_without_blocking_once_drained() {
        let (tx, rx) = bounded(4).unwrap();
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn zero_capacity_construction_is_a_valid_rendezvous_channel() {
        assert!(bounded::<i32>(0).is_ok());
    }
}
