//! Parked-operation records.
//!
//! A `Waiter<T>` is the heap-resident stand-in for the stack slot a cooperative
//! scheduler would write into directly. Queuing a value-carrying `Waiter` and
//! having the counterparty move a value in or out of its `slot` is this
//! crate's version of spec section 4.6's direct memory hand-off: safe, at the
//! cost of one extra move, per Design Notes option (b).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// What a parked thread is waiting to hear back.
pub(crate) struct WaiterState<T> {
    /// For a sending waiter: the value to hand off, taken by the receiver.
    /// For a receiving waiter: empty until a sender (or `close`) fills it.
    pub(crate) slot: Option<T>,
    /// `true` once the operation completed via a value transfer, `false` if
    /// it completed because the channel was closed.
    pub(crate) success: bool,
    /// Set once `slot`/`success` are final and the parked thread may read
    /// them. Guards against the spurious wakeups `Condvar` itself warns
    /// about.
    done: bool,
}

/// A single parked send or receive, queued on a channel's `send_waiters` or
/// `recv_waiters`.
pub(crate) struct Waiter<T> {
    state: Mutex<WaiterState<T>>,
    condvar: Condvar,
    /// The thread to be made runnable; kept mainly for diagnostics, since
    /// waking happens through `condvar`, not `Thread::unpark`.
    thread: Thread,
    /// Race-claim flag for a future multi-way `select` (spec section 4.5 /
    /// section 9). No code in this crate ever sets it to `true`; a select
    /// implementation built on top of this crate would use
    /// `compare_exchange` on this flag to claim a waiter that may also be
    /// enrolled on another channel, and a dequeuer would skip a waiter whose
    /// claim attempt fails.
    pub(crate) select_claimed: AtomicBool,
}

impl<T> Waiter<T> {
    /// A waiter parked on a send: `value` is the payload waiting to be
    /// handed to a receiver.
    pub(crate) fn new_send(value: T) -> Arc<Waiter<T>> {
        Waiter::new(Some(value))
    }

    /// A waiter parked on a receive: the slot starts empty and is filled by
    /// whichever sender (or `close`) wakes it.
    pub(crate) fn new_recv() -> Arc<Waiter<T>> {
        Waiter::new(None)
    }

    fn new(slot: Option<T>) -> Arc<Waiter<T>> {
        Arc::new(Waiter {
            state: Mutex::new(WaiterState {
                slot,
                success: false,
                done: false,
            }),
            condvar: Condvar::new(),
            thread: thread::current(),
            select_claimed: AtomicBool::new(false),
        })
    }

    /// Takes the payload out of a send-waiter without resolving it. Used by
    /// a receiver doing a direct hand-off: the value moves out here, then
    /// [`Waiter::resolve`] marks the waiter as delivered.
    pub(crate) fn take_value(&self) -> T {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .slot
            .take()
            .expect("waiter slot already taken")
    }

    /// Delivers a value into a receive-waiter's slot without resolving it.
    /// Used by a sender doing a direct hand-off.
    pub(crate) fn put_value(&self, value: T) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).slot = Some(value);
    }

    /// Marks the waiter resolved and wakes its owning thread. Must only be
    /// called once per waiter. `success == false` means "the channel closed
    /// while you were parked"; the zero/closed outcome has already been
    /// written into `slot` (or left empty) by the caller before this call.
    pub(crate) fn resolve(&self, success: bool) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(!guard.done, "waiter resolved twice");
        guard.success = success;
        guard.done = true;
        drop(guard);
        self.condvar.notify_one();
    }

    /// Blocks the current thread until [`Waiter::resolve`] has been called.
    /// Returns `(success, slot)`.
    pub(crate) fn wait(&self) -> (bool, Option<T>) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while !guard.done {
            guard = self
                .condvar
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner());
        }
        (guard.success, guard.slot.take())
    }

    /// Like [`Waiter::wait`], but gives up and returns `None` if `deadline`
    /// passes first. On timeout the waiter is left un-resolved; the caller
    /// is responsible for removing it from the channel's queue.
    pub(crate) fn wait_deadline(&self, deadline: Instant) -> Option<(bool, Option<T>)> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if guard.done {
                return Some((guard.success, guard.slot.take()));
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (next, timed_out) = self
                .condvar
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
            if timed_out.timed_out() && !guard.done {
                return None;
            }
        }
    }

    /// `true` if [`Waiter::resolve`] has already run. Used by a timed-out
    /// waiter to detect the race where it resolved just before the caller
    /// gave up on it.
    pub(crate) fn is_done(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).done
    }
}

/// Convenience used by timed sends/receives: a zero-duration deadline means
/// "don't actually block", matching `Condvar::wait_timeout`'s tolerance of a
/// zero timeout.
pub(crate) fn deadline_from(timeout: Duration) -> Instant {
    Instant::now() + timeout
}
