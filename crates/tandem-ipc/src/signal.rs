//! One-word blocking rendezvous between two threads.
//!
//! The waiting side blocks the OS thread on the word itself (futex /
//! `WaitOnAddress` / `__ulock_wait` through `atomic-wait`), mirroring
//! `Atomics.wait` / `Atomics.notify` on a shared `Int32Array`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const WAITING: u32 = 0;
pub const SIGNALED: u32 = 1;

/// The shareable backing word of a [`Signal`].
///
/// This is what the initiating side hands to its counterpart during setup.
#[derive(Clone, Debug)]
pub struct SignalHandle(Arc<AtomicU32>);

#[derive(Debug)]
pub struct Signal {
    state: Arc<AtomicU32>,
}

impl Signal {
    /// Create a new signal in the `WAITING` state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU32::new(WAITING)),
        }
    }

    /// Attach to a signal created elsewhere.
    ///
    /// The current state is left untouched.
    pub fn from_handle(handle: SignalHandle) -> Self {
        Self { state: handle.0 }
    }

    pub fn handle(&self) -> SignalHandle {
        SignalHandle(self.state.clone())
    }

    /// Set the signal and wake every waiter.
    pub fn signal(&self) {
        self.state.store(SIGNALED, Ordering::Release);
        atomic_wait::wake_all(&*self.state);
    }

    /// Block until the signal is set. Returns immediately if it already is.
    ///
    /// There is no timeout: a signal that is never set blocks forever.
    pub fn wait(&self) {
        while self.state.load(Ordering::Acquire) == WAITING {
            atomic_wait::wait(&*self.state, WAITING);
        }
    }

    pub fn reset(&self) {
        self.state.store(WAITING, Ordering::Release);
    }

    pub fn is_signaled(&self) -> bool {
        self.state.load(Ordering::Acquire) == SIGNALED
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_after_signal_returns_immediately() {
        let s = Signal::new();
        assert!(!s.is_signaled());
        s.signal();
        assert!(s.is_signaled());
        s.wait();
        s.wait();
    }

    #[test]
    fn reset_returns_to_waiting() {
        let s = Signal::new();
        s.signal();
        s.reset();
        assert!(!s.is_signaled());
    }

    #[test]
    fn wait_blocks_until_concurrent_signal() {
        let s = Signal::new();
        let remote = Signal::from_handle(s.handle());
        let released = Arc::new(AtomicBool::new(false));

        let waiter = {
            let released = released.clone();
            thread::spawn(move || {
                remote.wait();
                released.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!released.load(Ordering::SeqCst), "waiter returned before signal");

        s.signal();
        waiter.join().unwrap();
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn attaching_does_not_clear_state() {
        let s = Signal::new();
        s.signal();
        let remote = Signal::from_handle(s.handle());
        assert!(remote.is_signaled());
    }

    #[test]
    fn repeated_round_trips() {
        let request = Signal::new();
        let done = Signal::new();
        let (req_remote, done_remote) = (
            Signal::from_handle(request.handle()),
            Signal::from_handle(done.handle()),
        );

        let server = thread::spawn(move || {
            for _ in 0..100 {
                req_remote.wait();
                req_remote.reset();
                done_remote.signal();
            }
        });

        for _ in 0..100 {
            done.reset();
            request.signal();
            done.wait();
        }
        server.join().unwrap();
    }
}
