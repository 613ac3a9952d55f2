//! Bounded single-producer / single-consumer ring of 32-bit words.
//!
//! Design:
//! - The ring and both cursors live in shared memory (atomics) so each side
//!   observes the other's progress without locks.
//! - One slot is always left unused: `read == write` means empty and
//!   `write + 1 == read` (mod slots) means full.
//! - A multi-word write is published with a single cursor store, so a frame
//!   written by [`CircularWriter::write_array`] becomes visible atomically.
//! - The reader blocks on the write-cursor word; writers wake it after every
//!   publish.
//!
//! Exactly one [`CircularWriter`] and one [`CircularReader`] can be taken from
//! a buffer. Neither is `Clone`, which is what makes the lock-free protocol
//! sound.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Largest capacity, in words, a buffer can be created with. Cursors are
/// 32-bit and must stay well clear of wrapping.
pub const MAX_CAPACITY: usize = u32::MAX as usize / 2 - 1;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CircularBufferError {
    /// The write does not fit. Buffers are sized by the caller for the worst
    /// case burst; running out is a sizing bug, not backpressure.
    #[error("circular buffer overflow: {requested} words requested, {free} free")]
    Overflow { requested: usize, free: usize },
    #[error("the {0} end of this circular buffer has already been taken")]
    EndTaken(&'static str),
}

struct RingShared {
    read: AtomicU32,
    write: AtomicU32,
    slots: Box<[AtomicU32]>,
    writer_taken: AtomicBool,
    reader_taken: AtomicBool,
}

impl RingShared {
    fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    fn len(&self) -> usize {
        let n = self.slot_count();
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        ((write + n - read) % n) as usize
    }

    fn capacity(&self) -> usize {
        self.slots.len() - 1
    }
}

/// Shareable reference to a circular buffer.
///
/// Handles are cheap to clone and are what gets transmitted during setup; the
/// receiving side then takes the end it owns.
#[derive(Clone)]
pub struct CircularHandle {
    shared: Arc<RingShared>,
}

impl CircularHandle {
    /// Create a buffer able to hold `capacity` unread words.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "circular buffer capacity must be nonzero");
        assert!(
            capacity <= MAX_CAPACITY,
            "circular buffer capacity exceeds {MAX_CAPACITY} words"
        );
        let slots = (0..=capacity).map(|_| AtomicU32::new(0)).collect();
        Self {
            shared: Arc::new(RingShared {
                read: AtomicU32::new(0),
                write: AtomicU32::new(0),
                slots,
                writer_taken: AtomicBool::new(false),
                reader_taken: AtomicBool::new(false),
            }),
        }
    }

    /// Take the producer end. Fails if it was already taken.
    pub fn writer(&self) -> Result<CircularWriter, CircularBufferError> {
        if self.shared.writer_taken.swap(true, Ordering::AcqRel) {
            return Err(CircularBufferError::EndTaken("writer"));
        }
        Ok(CircularWriter {
            shared: self.shared.clone(),
        })
    }

    /// Take the consumer end. Fails if it was already taken.
    pub fn reader(&self) -> Result<CircularReader, CircularBufferError> {
        if self.shared.reader_taken.swap(true, Ordering::AcqRel) {
            return Err(CircularBufferError::EndTaken("reader"));
        }
        Ok(CircularReader {
            shared: self.shared.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.len() == 0
    }
}

impl std::fmt::Debug for CircularHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircularHandle")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

pub struct CircularWriter {
    shared: Arc<RingShared>,
}

impl CircularWriter {
    pub fn write(&mut self, word: u32) -> Result<(), CircularBufferError> {
        self.write_array(&[word])
    }

    /// Append all of `words` or nothing.
    pub fn write_array(&mut self, words: &[u32]) -> Result<(), CircularBufferError> {
        let shared = &*self.shared;
        let free = shared.capacity() - shared.len();
        if words.len() > free {
            return Err(CircularBufferError::Overflow {
                requested: words.len(),
                free,
            });
        }
        if words.is_empty() {
            return Ok(());
        }

        let n = shared.slot_count();
        // Only this end ever stores `write`.
        let start = shared.write.load(Ordering::Relaxed);
        for (i, &word) in words.iter().enumerate() {
            let index = (start + i as u32) % n;
            shared.slots[index as usize].store(word, Ordering::Relaxed);
        }
        let new_write = (start + words.len() as u32) % n;
        shared.write.store(new_write, Ordering::Release);
        atomic_wait::wake_all(&shared.write);
        Ok(())
    }

    /// Words that can still be written before the buffer is full.
    pub fn free(&self) -> usize {
        self.shared.capacity() - self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.len() == 0
    }

    pub fn handle(&self) -> CircularHandle {
        CircularHandle {
            shared: self.shared.clone(),
        }
    }
}

pub struct CircularReader {
    shared: Arc<RingShared>,
}

impl CircularReader {
    /// Non-blocking read. `None` means no data.
    pub fn read(&mut self) -> Option<u32> {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Acquire);
        // Only this end ever stores `read`.
        let read = shared.read.load(Ordering::Relaxed);
        if read == write {
            return None;
        }
        let word = shared.slots[read as usize].load(Ordering::Relaxed);
        shared
            .read
            .store((read + 1) % shared.slot_count(), Ordering::Release);
        Some(word)
    }

    /// Block until a word is available, then read it.
    pub fn read_wait(&mut self) -> u32 {
        loop {
            if let Some(word) = self.read() {
                return word;
            }
            let shared = &*self.shared;
            let write = shared.write.load(Ordering::Acquire);
            if write == shared.read.load(Ordering::Relaxed) {
                // Returns immediately if `write` moved since the load above.
                atomic_wait::wait(&shared.write, write);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shared.len() == 0
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn handle(&self) -> CircularHandle {
        CircularHandle {
            shared: self.shared.clone(),
        }
    }
}
