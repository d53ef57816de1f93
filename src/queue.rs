//! A blocking hand-off queue, guarded by a `Mutex` and woken through a `Condvar`.
//!
//! See the documentation of the [`SynchronizedQueue`] struct for more information.
//!
//! [`SynchronizedQueue`]: struct.SynchronizedQueue.html

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::util;

/// A thread-safe, unbounded message channel where receivers block until something arrives.
///
/// Any number of threads may `send` and `receive` on the same `SynchronizedQueue`, usually by
/// sharing it through an `Arc`. Sending never blocks on capacity; receiving blocks the calling
/// thread until the backlog holds at least one value, then removes exactly one.
///
/// Despite the name, values come back out **last-in-first-out**: `receive` always takes the most
/// recently sent value still in the backlog. For the main user of this type, a consumer
/// discarding phase messages until it sees the one it wants, the order makes no difference.
///
/// Every read and write of the backlog happens under the queue's lock, so no value is ever handed
/// to two receivers and no sent value is ever dropped.
///
/// Dropping the queue while a thread is blocked in `receive` is impossible through safe code: the
/// blocked thread holds a borrow of it. Share it with an `Arc` to let it outlive its users.
///
/// # Example
///
/// ```
/// use signalphase::SynchronizedQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(SynchronizedQueue::new());
///
/// let consumer = {
///     let queue = queue.clone();
///     thread::spawn(move || queue.receive())
/// };
///
/// queue.send("hello!");
///
/// assert_eq!(consumer.join().unwrap(), "hello!");
/// ```
#[derive(Debug)]
pub struct SynchronizedQueue<T> {
    backlog: Mutex<Vec<T>>,
    available: Condvar,
}

impl<T> SynchronizedQueue<T> {
    /// Creates a new, empty `SynchronizedQueue`.
    pub fn new() -> SynchronizedQueue<T> {
        SynchronizedQueue {
            backlog: Mutex::new(Vec::new()),
            available: Condvar::new(),
        }
    }

    /// Adds a value to the backlog and wakes one blocked receiver, if any.
    ///
    /// This never blocks for longer than it takes to acquire the lock.
    pub fn send(&self, value: T) {
        let mut backlog = util::recover(self.backlog.lock());
        backlog.push(value);
        log::trace!("queue: sent, backlog now {}", backlog.len());
        drop(backlog);

        self.available.notify_one();
    }

    /// Blocks the current thread until the backlog is non-empty, then removes and returns the most
    /// recently sent value.
    ///
    /// If nothing is ever sent, this will block forever.
    ///
    /// # Example
    ///
    /// ```
    /// use signalphase::SynchronizedQueue;
    ///
    /// let queue = SynchronizedQueue::new();
    /// queue.send(1);
    /// queue.send(2);
    ///
    /// assert_eq!(queue.receive(), 2);
    /// assert_eq!(queue.receive(), 1);
    /// ```
    pub fn receive(&self) -> T {
        let backlog = util::recover(self.backlog.lock());
        let mut backlog = util::recover(self.available.wait_while(backlog, |b| b.is_empty()));

        loop {
            //wait_while only hands the guard back once the backlog is non-empty, but let's not
            //reach for unwrap to prove it
            if let Some(value) = backlog.pop() {
                return value;
            }
            backlog = util::recover(self.available.wait(backlog));
        }
    }

    /// Removes and returns the most recently sent value if there is one, without blocking.
    pub fn try_receive(&self) -> Option<T> {
        util::recover(self.backlog.lock()).pop()
    }

    /// Blocks the current thread until either a value is available or the timeout elapses.
    ///
    /// Returns `None` if the timeout elapsed with the backlog still empty. Spurious wakeups of the
    /// underlying `Condvar` are absorbed; the wait only ends early when a value is taken.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let backlog = util::recover(self.backlog.lock());
        let (mut backlog, status) = util::recover(
            self.available
                .wait_timeout_while(backlog, timeout, |b| b.is_empty()),
        );

        if status.timed_out() {
            log::trace!("queue: receive timed out after {:?}", timeout);
        }

        backlog.pop()
    }

    /// Returns the number of values currently waiting in the backlog.
    ///
    /// This is only a snapshot: other threads may send or receive as soon as it returns.
    pub fn len(&self) -> usize {
        util::recover(self.backlog.lock()).len()
    }

    /// Returns whether the backlog is currently empty.
    pub fn is_empty(&self) -> bool {
        util::recover(self.backlog.lock()).is_empty()
    }

    /// Takes every value currently in the backlog in one step, oldest first.
    ///
    /// The whole backlog is taken under a single hold of the lock, so the returned values keep the
    /// order they were sent in even if other threads keep sending while this runs.
    pub fn drain(&self) -> Vec<T> {
        let mut backlog = util::recover(self.backlog.lock());
        let taken = std::mem::take(&mut *backlog);
        log::trace!("queue: drained {} values", taken.len());
        taken
    }
}

impl<T> Default for SynchronizedQueue<T> {
    fn default() -> SynchronizedQueue<T> {
        SynchronizedQueue::new()
    }
}
