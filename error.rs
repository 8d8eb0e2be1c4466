//! Error types returned by channel operations.
//!
//! None of these carry a backtrace or source chain; channel failures are
//! always a direct consequence of a close race, a full buffer, or a bad
//! construction argument, so a plain variant is enough to act on.

use std::error::Error;
use std::fmt;

/// Returned by a blocking send when the channel is (or becomes) closed
/// before the value could be delivered.
///
/// The value that could not be sent is returned so the caller can decide
/// what to do with it instead of losing it silently.
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// Unwraps the undelivered value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError").field("..", &"..").finish()
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send on a closed channel")
    }
}

impl<T> Error for SendError<T> {}

// `SendError` hides its payload in `Debug`, so equality is trivial too: two
// `SendError`s are equal regardless of the value they're carrying, matching
// `std::sync::mpsc::SendError`'s own `PartialEq` impl.
impl<T> PartialEq for SendError<T> {
    fn eq(&self, _other: &SendError<T>) -> bool {
        true
    }
}

/// Detailed failure of a non-blocking send.
pub enum TrySendError<T> {
    /// The channel has no free capacity and no waiting receiver right now.
    Full(T),
    /// The channel is closed; the value was not sent.
    Disconnected(T),
}

impl<T> TrySendError<T> {
    /// Unwraps the undelivered value, regardless of which case occurred.
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(v) | TrySendError::Disconnected(v) => v,
        }
    }

    /// Discards the value and converts into a [`SendError`], e.g. for `?`
    /// propagation once the caller no longer cares about `Full` vs.
    /// `Disconnected`.
    pub fn into_send_error(self) -> SendError<T> {
        SendError(self.into_inner())
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.debug_tuple("Full").field(&"..").finish(),
            TrySendError::Disconnected(_) => f.debug_tuple("Disconnected").field(&"..").finish(),
        }
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => write!(f, "sending on a full channel"),
            TrySendError::Disconnected(_) => write!(f, "sending on a closed channel"),
        }
    }
}

impl<T> Error for TrySendError<T> {}

/// Returned by a blocking send that waited past its deadline.
pub enum SendTimeoutError<T> {
    /// The deadline elapsed before a slot or waiting receiver appeared.
    Timeout(T),
    /// The channel is closed; the value was not sent.
    Disconnected(T),
}

impl<T> SendTimeoutError<T> {
    /// Unwraps the undelivered value, regardless of which case occurred.
    pub fn into_inner(self) -> T {
        match self {
            SendTimeoutError::Timeout(v) | SendTimeoutError::Disconnected(v) => v,
        }
    }
}

impl<T> fmt::Debug for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTimeoutError::Timeout(_) => f.debug_tuple("Timeout").field(&"..").finish(),
            SendTimeoutError::Disconnected(_) => {
                f.debug_tuple("Disconnected").field(&"..").finish()
            }
        }
    }
}

impl<T> fmt::Display for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTimeoutError::Timeout(_) => write!(f, "timed out waiting to send"),
            SendTimeoutError::Disconnected(_) => write!(f, "sending on a closed channel"),
        }
    }
}

impl<T> Error for SendTimeoutError<T> {}

/// Returned by a blocking receive when the channel is closed and drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvError;

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiving on an empty and closed channel")
    }
}

impl Error for RecvError {}

/// Detailed failure of a non-blocking receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// No value is available right now, but the channel is still open.
    Empty,
    /// The channel is closed and has no buffered values left.
    Disconnected,
}

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryRecvError::Empty => write!(f, "receiving on an empty channel"),
            TryRecvError::Disconnected => write!(f, "receiving on an empty and closed channel"),
        }
    }
}

impl Error for TryRecvError {}

/// Returned by a blocking receive that waited past its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeoutError {
    /// The deadline elapsed before a value appeared.
    Timeout,
    /// The channel is closed and has no buffered values left.
    Disconnected,
}

impl fmt::Display for RecvTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecvTimeoutError::Timeout => write!(f, "timed out waiting to receive"),
            RecvTimeoutError::Disconnected => {
                write!(f, "receiving on an empty and closed channel")
            }
        }
    }
}

impl Error for RecvTimeoutError {}

/// Returned by [`crate::bounded`] when the requested capacity cannot be
/// satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructError {
    /// `capacity * size_of::<T>()` would overflow a `usize`, or exceeds the
    /// platform's maximum single-allocation size.
    CapacityOverflow,
}

impl fmt::Display for ConstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructError::CapacityOverflow => {
                write!(f, "requested channel capacity is out of range")
            }
        }
    }
}

impl Error for ConstructError {}

/// Returned by [`crate::Sender::close`] / [`crate::Receiver::close`] when the
/// channel was already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseError;

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel is already closed")
    }
}

impl Error for CloseError {}
