//! The channel object, and the `Sender`/`Receiver` handles built on top of it.
//!
//! This is the core described by spec section 4: a mutex-guarded circular
//! buffer plus a pair of FIFO waiter queues, with send and receive each
//! walking the same locked decision tree (direct hand-off, buffer, or park)
//! before falling back to blocking.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_utils::CachePadded;
use log::{debug, trace, warn};

use crate::buffer::RingBuffer;
use crate::error::{
    CloseError, ConstructError, RecvError, RecvTimeoutError, SendError, SendTimeoutError,
    TryRecvError, TrySendError,
};
use crate::waiter::{deadline_from, Waiter};

enum Flavor<T> {
    Bounded(RingBuffer<T>),
    Unbounded(VecDeque<T>),
}

struct Inner<T> {
    flavor: Flavor<T>,
    closed: bool,
    send_waiters: VecDeque<Arc<Waiter<T>>>,
    recv_waiters: VecDeque<Arc<Waiter<T>>>,
    sender_count: usize,
}

/// The channel object proper (spec section 3). Always held behind an `Arc`
/// and shared by every `Sender`/`Receiver` handle; never exposed directly.
struct Channel<T> {
    state: Mutex<Inner<T>>,
    /// `None` for an unbounded channel, `Some(0)` for a rendezvous channel,
    /// `Some(n)` for a buffered channel of capacity `n`. Immutable after
    /// construction, per spec section 3.
    capacity: Option<usize>,
    // Unlocked mirrors of the locked state, touched only by the fast paths
    // in spec sections 4.2 step 1 and 4.3 step 1. Cache-line padded, as
    // crossbeam-channel pads its head/tail counters, since these are read
    // by every thread attempting a non-blocking operation.
    closed_fast: CachePadded<AtomicBool>,
    len_fast: CachePadded<AtomicUsize>,
    send_waiters_fast: CachePadded<AtomicUsize>,
    recv_waiters_fast: CachePadded<AtomicUsize>,
}

impl<T> Channel<T> {
    fn new_bounded(capacity: usize) -> Self {
        Channel {
            state: Mutex::new(Inner {
                flavor: Flavor::Bounded(RingBuffer::with_capacity(capacity)),
                closed: false,
                send_waiters: VecDeque::new(),
                recv_waiters: VecDeque::new(),
                sender_count: 1,
            }),
            capacity: Some(capacity),
            closed_fast: CachePadded::new(AtomicBool::new(false)),
            len_fast: CachePadded::new(AtomicUsize::new(0)),
            send_waiters_fast: CachePadded::new(AtomicUsize::new(0)),
            recv_waiters_fast: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    fn new_unbounded() -> Self {
        Channel {
            state: Mutex::new(Inner {
                flavor: Flavor::Unbounded(VecDeque::new()),
                closed: false,
                send_waiters: VecDeque::new(),
                recv_waiters: VecDeque::new(),
                sender_count: 1,
            }),
            capacity: None,
            closed_fast: CachePadded::new(AtomicBool::new(false)),
            len_fast: CachePadded::new(AtomicUsize::new(0)),
            send_waiters_fast: CachePadded::new(AtomicUsize::new(0)),
            recv_waiters_fast: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ---- fast-path policies (spec sections 4.2/4.3, `full()`/`empty()`) ----

    /// `full()`: for a buffered channel, `count == capacity`; for an
    /// unbuffered channel, no receiver is waiting; an unbounded channel is
    /// never full.
    fn is_full_fast(&self) -> bool {
        match self.capacity {
            Some(0) => self.recv_waiters_fast.load(SeqCst) == 0,
            Some(cap) => self.len_fast.load(SeqCst) == cap,
            None => false,
        }
    }

    /// `empty()`: for a buffered or unbounded channel, `count == 0`; for an
    /// unbuffered channel, no sender is waiting.
    fn is_empty_fast(&self) -> bool {
        match self.capacity {
            Some(0) => self.send_waiters_fast.load(SeqCst) == 0,
            _ => self.len_fast.load(SeqCst) == 0,
        }
    }

    fn is_closed_fast(&self) -> bool {
        self.closed_fast.load(SeqCst)
    }

    // ---- bookkeeping kept in sync with `inner` under the lock ----

    fn sync_len(&self, inner: &Inner<T>) {
        let len = match &inner.flavor {
            Flavor::Bounded(rb) => rb.len(),
            Flavor::Unbounded(q) => q.len(),
        };
        self.len_fast.store(len, SeqCst);
    }

    fn sync_waiter_counts(&self, inner: &Inner<T>) {
        self.send_waiters_fast
            .store(inner.send_waiters.len(), SeqCst);
        self.recv_waiters_fast
            .store(inner.recv_waiters.len(), SeqCst);
    }

    fn locked_is_empty(inner: &Inner<T>) -> bool {
        match &inner.flavor {
            Flavor::Bounded(rb) => rb.is_empty(),
            Flavor::Unbounded(q) => q.is_empty(),
        }
    }

    // ---- send ----

    /// Non-blocking send: spec section 4.2 steps 1-6 (step 7, parking, is
    /// the caller's job — see [`Channel::send_or_park`]).
    fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        if !self.is_closed_fast() && self.is_full_fast() {
            return Err(TrySendError::Full(value));
        }
        let mut inner = self.lock();
        if inner.closed {
            drop(inner);
            return Err(TrySendError::Disconnected(value));
        }
        if let Some(w) = inner.recv_waiters.pop_front() {
            self.sync_waiter_counts(&inner);
            drop(inner);
            trace!("try_send: direct hand-off to a waiting receiver");
            w.put_value(value);
            w.resolve(true);
            return Ok(());
        }
        match &mut inner.flavor {
            Flavor::Bounded(rb) if rb.is_full() => {
                drop(inner);
                Err(TrySendError::Full(value))
            }
            Flavor::Bounded(rb) => {
                rb.push(value);
                self.sync_len(&inner);
                drop(inner);
                Ok(())
            }
            Flavor::Unbounded(q) => {
                q.push_back(value);
                self.sync_len(&inner);
                drop(inner);
                Ok(())
            }
        }
    }

    /// Attempts a non-blocking send first (reusing every check `try_send`
    /// already makes); only on a genuine `Full` does it re-acquire the lock
    /// to either catch a last-instant opening or enqueue a waiter and
    /// report back that the caller must park. The redundant re-check exists
    /// because `try_send`'s unlocked fast-reject fires regardless of
    /// blocking mode; that's harmless here; it only ever steers a blocking
    /// caller into this same careful re-check instead of returning early.
    fn send_or_park(&self, value: T) -> Result<(), SendOutcome<T>> {
        match self.try_send(value) {
            Ok(()) => Ok(()),
            Err(TrySendError::Disconnected(v)) => Err(SendOutcome::Disconnected(v)),
            Err(TrySendError::Full(v)) => {
                let mut inner = self.lock();
                if inner.closed {
                    drop(inner);
                    return Err(SendOutcome::Disconnected(v));
                }
                if let Some(w) = inner.recv_waiters.pop_front() {
                    self.sync_waiter_counts(&inner);
                    drop(inner);
                    w.put_value(v);
                    w.resolve(true);
                    return Ok(());
                }
                if let Flavor::Bounded(rb) = &mut inner.flavor {
                    if !rb.is_full() {
                        rb.push(v);
                        self.sync_len(&inner);
                        drop(inner);
                        return Ok(());
                    }
                }
                let waiter = Waiter::new_send(v);
                inner.send_waiters.push_back(waiter.clone());
                self.sync_waiter_counts(&inner);
                debug!(
                    "send: parking, {} sender(s) now waiting",
                    inner.send_waiters.len()
                );
                drop(inner);
                Err(SendOutcome::Parked(waiter))
            }
        }
    }

    fn send(&self, value: T) -> Result<(), SendError<T>> {
        match self.send_or_park(value) {
            Ok(()) => Ok(()),
            Err(SendOutcome::Disconnected(v)) => Err(SendError(v)),
            Err(SendOutcome::Parked(waiter)) => {
                let (success, value) = waiter.wait();
                if success {
                    Ok(())
                } else {
                    warn!("send: woke to find the channel closed");
                    Err(SendError(
                        value.expect("close() leaves a parked sender's value in its waiter"),
                    ))
                }
            }
        }
    }

    fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        match self.send_or_park(value) {
            Ok(()) => Ok(()),
            Err(SendOutcome::Disconnected(v)) => Err(SendTimeoutError::Disconnected(v)),
            Err(SendOutcome::Parked(waiter)) => {
                let deadline = deadline_from(timeout);
                match waiter.wait_deadline(deadline) {
                    Some((true, _)) => Ok(()),
                    Some((false, v)) => Err(SendTimeoutError::Disconnected(
                        v.expect("close() leaves a parked sender's value in its waiter"),
                    )),
                    None => {
                        let mut inner = self.lock();
                        if waiter.is_done() {
                            drop(inner);
                            let (success, v) = waiter.wait();
                            return if success {
                                Ok(())
                            } else {
                                Err(SendTimeoutError::Disconnected(v.expect(
                                    "close() leaves a parked sender's value in its waiter",
                                )))
                            };
                        }
                        inner.send_waiters.retain(|w| !Arc::ptr_eq(w, &waiter));
                        self.sync_waiter_counts(&inner);
                        drop(inner);
                        Err(SendTimeoutError::Timeout(waiter.take_value()))
                    }
                }
            }
        }
    }

    // ---- receive ----

    /// Non-blocking receive: spec section 4.3 steps 1-6.
    fn try_recv(&self) -> Result<T, TryRecvError> {
        if self.is_empty_fast() && !self.is_closed_fast() {
            return Err(TryRecvError::Empty);
        }
        let mut inner = self.lock();
        if inner.closed && Self::locked_is_empty(&inner) {
            drop(inner);
            return Err(TryRecvError::Disconnected);
        }
        if let Some((v, waiter)) = self.take_ready_locked(&mut inner) {
            drop(inner);
            if let Some(w) = waiter {
                w.resolve(true);
            }
            return Ok(v);
        }
        drop(inner);
        Err(TryRecvError::Empty)
    }

    /// Attempts the two "something is ready right now" branches of spec
    /// section 4.3 (steps 4 and 5). Returns `None` if the caller must park.
    ///
    /// On a hand-off from a waiting sender, the returned waiter still needs
    /// `resolve(true)` called on it — deliberately left to the caller, which
    /// must do so only after releasing `inner`, matching the send path's own
    /// unlock-before-resolve ordering (spec section 4.3 step 4: "release
    /// lock, mark waiter `success = true`, wake `w`").
    fn take_ready_locked(
        &self,
        inner: &mut MutexGuard<'_, Inner<T>>,
    ) -> Option<(T, Option<Arc<Waiter<T>>>)> {
        if let Some(w) = inner.send_waiters.pop_front() {
            self.sync_waiter_counts(inner);
            let value = match &mut inner.flavor {
                // A rendezvous channel (`capacity == 0`) has no slots at all;
                // `rb.is_full()` is vacuously true there, so the capacity
                // check is required to keep this branch from indexing into
                // an empty buffer.
                Flavor::Bounded(rb) if rb.capacity() > 0 && rb.is_full() => {
                    let incoming = w.take_value();
                    rb.swap_head_for_waiting_sender(incoming)
                }
                _ => w.take_value(),
            };
            self.sync_len(inner);
            return Some((value, Some(w)));
        }
        match &mut inner.flavor {
            Flavor::Bounded(rb) if !rb.is_empty() => {
                let v = rb.pop();
                self.sync_len(inner);
                Some((v, None))
            }
            Flavor::Unbounded(q) if !q.is_empty() => {
                let v = q.pop_front().unwrap();
                self.sync_len(inner);
                Some((v, None))
            }
            _ => None,
        }
    }

    fn recv_or_park(&self) -> Result<T, RecvOutcome<T>> {
        match self.try_recv() {
            Ok(v) => Ok(v),
            Err(TryRecvError::Disconnected) => Err(RecvOutcome::Disconnected),
            Err(TryRecvError::Empty) => {
                let mut inner = self.lock();
                if inner.closed && Self::locked_is_empty(&inner) {
                    drop(inner);
                    return Err(RecvOutcome::Disconnected);
                }
                if let Some((v, waiter)) = self.take_ready_locked(&mut inner) {
                    drop(inner);
                    if let Some(w) = waiter {
                        w.resolve(true);
                    }
                    return Ok(v);
                }
                let waiter = Waiter::new_recv();
                inner.recv_waiters.push_back(waiter.clone());
                self.sync_waiter_counts(&inner);
                debug!(
                    "recv: parking, {} receiver(s) now waiting",
                    inner.recv_waiters.len()
                );
                drop(inner);
                Err(RecvOutcome::Parked(waiter))
            }
        }
    }

    fn recv(&self) -> Result<T, RecvError> {
        match self.recv_or_park() {
            Ok(v) => Ok(v),
            Err(RecvOutcome::Disconnected) => Err(RecvError),
            Err(RecvOutcome::Parked(waiter)) => {
                let (success, value) = waiter.wait();
                if success {
                    Ok(value.expect("a resolved receive waiter always carries its value"))
                } else {
                    Err(RecvError)
                }
            }
        }
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        match self.recv_or_park() {
            Ok(v) => Ok(v),
            Err(RecvOutcome::Disconnected) => Err(RecvTimeoutError::Disconnected),
            Err(RecvOutcome::Parked(waiter)) => {
                let deadline = deadline_from(timeout);
                match waiter.wait_deadline(deadline) {
                    Some((true, v)) => {
                        Ok(v.expect("a resolved receive waiter always carries its value"))
                    }
                    Some((false, _)) => Err(RecvTimeoutError::Disconnected),
                    None => {
                        let mut inner = self.lock();
                        if waiter.is_done() {
                            drop(inner);
                            let (success, v) = waiter.wait();
                            return if success {
                                Ok(v.expect("a resolved receive waiter always carries its value"))
                            } else {
                                Err(RecvTimeoutError::Disconnected)
                            };
                        }
                        inner.recv_waiters.retain(|w| !Arc::ptr_eq(w, &waiter));
                        self.sync_waiter_counts(&inner);
                        drop(inner);
                        Err(RecvTimeoutError::Timeout)
                    }
                }
            }
        }
    }

    // ---- close (spec section 4.4) ----

    fn close(&self) -> Result<(), CloseError> {
        let inner = self.lock();
        if inner.closed {
            drop(inner);
            return Err(CloseError);
        }
        self.close_with_guard(inner);
        Ok(())
    }

    /// Drains both waiter queues, flips `closed`, then releases the lock
    /// before resolving any waiter — the "drain-then-unlock-then-wake"
    /// ordering spec section 4.4 requires so no woken thread can observe
    /// intermediate state. Takes ownership of the guard so it can be
    /// dropped before the wake-up loop.
    fn close_with_guard(&self, mut inner: MutexGuard<'_, Inner<T>>) {
        inner.closed = true;
        self.closed_fast.store(true, SeqCst);

        let recv_waiters: Vec<_> = inner.recv_waiters.drain(..).collect();
        let send_waiters: Vec<_> = inner.send_waiters.drain(..).collect();
        self.sync_waiter_counts(&inner);
        debug!(
            "close: draining {} receiver(s) and {} sender(s)",
            recv_waiters.len(),
            send_waiters.len()
        );
        drop(inner);

        for w in recv_waiters {
            // The zero-value is simply "no value": `slot` stays `None`.
            w.resolve(false);
        }
        for w in send_waiters {
            // Leave the sender's value in its waiter's slot so `send`/
            // `send_timeout` can hand it back via `SendError`/
            // `SendTimeoutError` instead of dropping it silently.
            w.resolve(false);
        }
    }

    fn len(&self) -> usize {
        self.len_fast.load(SeqCst)
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn is_closed(&self) -> bool {
        self.is_closed_fast()
    }
}

enum SendOutcome<T> {
    Disconnected(T),
    Parked(Arc<Waiter<T>>),
}

enum RecvOutcome<T> {
    Disconnected,
    Parked(Arc<Waiter<T>>),
}

/// Validates a requested bounded capacity the way spec section 4.1 requires:
/// `capacity * size_of::<T>()` must not overflow, and must fit in the
/// platform's largest single allocation (`isize::MAX` bytes, which is what
/// Rust's allocator actually enforces in place of the spec's informal
/// "platform maximum").
fn check_capacity<T>(capacity: usize) -> Result<(), ConstructError> {
    let elem_size = std::mem::size_of::<T>().max(1);
    match capacity.checked_mul(elem_size) {
        Some(bytes) if bytes <= isize::MAX as usize => Ok(()),
        _ => Err(ConstructError::CapacityOverflow),
    }
}

/// Creates a bounded (buffered, or rendezvous if `capacity == 0`) channel.
///
/// See [`unbounded`] for a channel whose sends never block.
pub fn bounded<T>(capacity: usize) -> Result<(Sender<T>, Receiver<T>), ConstructError> {
    check_capacity::<T>(capacity)?;
    let chan = Arc::new(Channel::new_bounded(capacity));
    Ok((Sender { chan: chan.clone() }, Receiver { chan }))
}

/// Creates an unbounded channel: `send` never blocks and never fails except
/// when the channel has been closed.
pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    let chan = Arc::new(Channel::new_unbounded());
    (Sender { chan: chan.clone() }, Receiver { chan })
}

/// The sending half of a channel created by [`bounded`] or [`unbounded`].
///
/// Cloning a `Sender` creates another producer handle onto the same
/// channel; the channel is only closed automatically once every clone has
/// been dropped (or `close` is called explicitly).
pub struct Sender<T> {
    chan: Arc<Channel<T>>,
}

impl<T> Sender<T> {
    /// Blocks until `value` is delivered (directly to a waiting receiver, or
    /// into the buffer), or the channel is closed.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        self.chan.send(value)
    }

    /// Like [`Sender::send`], but gives up and returns the value after
    /// `timeout` if no slot or receiver appears first.
    pub fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        self.chan.send_timeout(value, timeout)
    }

    /// Sends `value` only if it can be delivered immediately; never blocks.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        self.chan.try_send(value)
    }

    /// Closes the channel. Every blocked and future receive drains the
    /// buffer and then reports the channel as empty; every blocked and
    /// future send fails.
    pub fn close(&self) -> Result<(), CloseError> {
        self.chan.close()
    }

    /// Number of values currently buffered (always `0` for a rendezvous
    /// channel with no buffer, or momentarily for an unbounded channel mid
    /// burst).
    pub fn len(&self) -> usize {
        self.chan.len()
    }

    /// `true` if no values are currently buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` for an unbounded channel; `Some(capacity)` otherwise.
    pub fn capacity(&self) -> Option<usize> {
        self.chan.capacity()
    }

    /// `true` once `close` has been called (by this handle, another sender,
    /// or implicitly by the last sender being dropped).
    pub fn is_closed(&self) -> bool {
        self.chan.is_closed()
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        let mut inner = self.chan.lock();
        inner.sender_count += 1;
        drop(inner);
        Sender {
            chan: self.chan.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut inner = self.chan.lock();
        inner.sender_count -= 1;
        if inner.sender_count == 0 && !inner.closed {
            self.chan.close_with_guard(inner);
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender").finish_non_exhaustive()
    }
}

/// The receiving half of a channel created by [`bounded`] or [`unbounded`].
///
/// Cloning a `Receiver` creates another consumer handle; every value is
/// still delivered to exactly one receiver (this is a multi-consumer queue,
/// not a broadcast).
pub struct Receiver<T> {
    chan: Arc<Channel<T>>,
}

impl<T> Receiver<T> {
    /// Blocks until a value is available, or the channel is closed and
    /// drained.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.chan.recv()
    }

    /// Like [`Receiver::recv`], but gives up after `timeout` if nothing
    /// arrives first.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.chan.recv_timeout(timeout)
    }

    /// Takes a value only if one is available immediately; never blocks.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.chan.try_recv()
    }

    /// An iterator that blocks on [`Receiver::recv`] until the channel
    /// closes and drains, then ends. Mirrors `std::sync::mpsc::Receiver`'s
    /// `IntoIterator`/`iter` pair.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { receiver: self }
    }

    /// An iterator that yields whatever is immediately available and stops
    /// as soon as the channel is empty, without blocking.
    pub fn try_iter(&self) -> TryIter<'_, T> {
        TryIter { receiver: self }
    }

    /// Closes the channel from the receiving side (equivalent to calling
    /// [`Sender::close`]).
    pub fn close(&self) -> Result<(), CloseError> {
        self.chan.close()
    }

    /// Number of values currently buffered.
    pub fn len(&self) -> usize {
        self.chan.len()
    }

    /// `true` if no values are currently buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` for an unbounded channel; `Some(capacity)` otherwise.
    pub fn capacity(&self) -> Option<usize> {
        self.chan.capacity()
    }

    /// `true` once the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.chan.is_closed()
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Receiver {
            chan: self.chan.clone(),
        }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver").finish_non_exhaustive()
    }
}

/// Iterator returned by [`Receiver::iter`].
pub struct Iter<'a, T> {
    receiver: &'a Receiver<T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

impl<T> IntoIterator for Receiver<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;
    fn into_iter(self) -> IntoIter<T> {
        IntoIter { receiver: self }
    }
}

/// Iterator returned by `Receiver`'s `IntoIterator` impl.
pub struct IntoIter<T> {
    receiver: Receiver<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

/// Iterator returned by [`Receiver::try_iter`].
pub struct TryIter<'a, T> {
    receiver: &'a Receiver<T>,
}

impl<'a, T> Iterator for TryIter<'a, T> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}
