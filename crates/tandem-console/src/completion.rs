//! Per-console completion channel for synchronous calls.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tandem_ipc::{Signal, SignalHandle};

/// Shareable backing of a [`Completion`], handed to the worker at setup.
#[derive(Clone, Debug)]
pub struct CompletionHandle {
    signal: SignalHandle,
    result: Arc<AtomicU32>,
}

/// A [`Signal`] plus the word holding the call's result.
///
/// The foreground stores the result before setting the signal, so a worker
/// released from [`wait`](Self::wait) always reads the value of the call it
/// waited for.
#[derive(Debug)]
pub struct Completion {
    signal: Signal,
    result: Arc<AtomicU32>,
}

impl Completion {
    pub fn new() -> Self {
        Self {
            signal: Signal::new(),
            result: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn from_handle(handle: CompletionHandle) -> Self {
        Self {
            signal: Signal::from_handle(handle.signal),
            result: handle.result,
        }
    }

    pub fn handle(&self) -> CompletionHandle {
        CompletionHandle {
            signal: self.signal.handle(),
            result: self.result.clone(),
        }
    }

    pub fn complete(&self, result: u32) {
        self.result.store(result, Ordering::Release);
        self.signal.signal();
    }

    pub fn reset(&self) {
        self.signal.reset();
    }

    /// Block until completed and return the result word.
    pub fn wait(&self) -> u32 {
        self.signal.wait();
        self.result.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.signal.is_signaled()
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn result_is_visible_after_wait() {
        let foreground = Completion::new();
        let worker = Completion::from_handle(foreground.handle());

        let results = thread::spawn(move || {
            (1..=50u32)
                .map(|_| {
                    let r = worker.wait();
                    worker.reset();
                    r
                })
                .collect::<Vec<_>>()
        });

        for i in 1..=50u32 {
            // Wait for the worker to consume the previous completion.
            while foreground.is_complete() {
                thread::yield_now();
            }
            foreground.complete(i * 10);
        }
        assert_eq!(
            results.join().unwrap(),
            (1..=50u32).map(|i| i * 10).collect::<Vec<_>>()
        );
    }
}
