//! Event and remote-allocation messages over a circular buffer.
//!
//! Wire format (all words `u32`):
//! - event:  `[EVENT_MARKER, event_id, arg_count, arg0, .., argN]`
//! - malloc: `[MALLOC_MARKER, request_id, size]`
//!
//! Each message is written with one `write_array`, so a reader that sees the
//! marker always finds the rest of the frame.

use crate::callbacks::{CallbackRegistry, EventCallback};
use crate::circular::{CircularBufferError, CircularReader, CircularWriter};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, trace};

/// Random positive 32-bit value marking an event frame.
pub const EVENT_MARKER: u32 = 0x6846_10d6;
/// Random positive 32-bit value marking an allocation request frame.
pub const MALLOC_MARKER: u32 = 0x5194_9385;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventQueueError {
    #[error("expected an event or malloc marker, found 0x{0:08x}")]
    BadMarker(u32),
    #[error("message truncated: missing {0}")]
    Truncated(&'static str),
    #[error("event id {0} was never registered")]
    UnregisteredEvent(u32),
    #[error("remote allocation of {size} bytes failed")]
    AllocationFailed { size: u32 },
    #[error("allocation reply for request {request_id} could not be delivered: {reason}")]
    ReplyFailed { request_id: u32, reason: String },
    #[error(transparent)]
    Buffer(#[from] CircularBufferError),
}

/// Producer side of the event queue.
pub struct EventQueueSend {
    writer: CircularWriter,
}

impl EventQueueSend {
    pub fn new(writer: CircularWriter) -> Self {
        Self { writer }
    }

    pub fn post_event(&mut self, event_id: u32, args: &[u32]) -> Result<(), EventQueueError> {
        let mut frame = Vec::with_capacity(3 + args.len());
        frame.push(EVENT_MARKER);
        frame.push(event_id);
        frame.push(args.len() as u32);
        frame.extend_from_slice(args);
        self.writer.write_array(&frame)?;
        trace!(event_id, argc = args.len(), "posted event");
        Ok(())
    }

    pub fn post_malloc(&mut self, request_id: u32, size: u32) -> Result<(), EventQueueError> {
        self.writer
            .write_array(&[MALLOC_MARKER, request_id, size])?;
        trace!(request_id, size, "posted malloc request");
        Ok(())
    }
}

/// Allocation service used when a malloc request arrives.
///
/// `malloc` allocates on behalf of the remote side; `complete` sends the
/// resulting address back tagged with the request id.
pub trait RemoteAllocator {
    fn malloc(&mut self, size: u32) -> Result<u32, EventQueueError>;
    fn complete(&mut self, request_id: u32, addr: u32) -> Result<(), EventQueueError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub event_id: u32,
    pub args: Vec<u32>,
}

/// Consumer side of the event queue.
///
/// Arrived events are kept in a pending table in arrival order until they are
/// either taken by [`wait_event`](Self::wait_event) or dispatched to their
/// bound callback by
/// [`process_incoming_commands`](Self::process_incoming_commands).
pub struct EventQueueReceive {
    reader: CircularReader,
    pending: VecDeque<PendingEvent>,
    callbacks: CallbackRegistry,
}

impl EventQueueReceive {
    pub fn new(reader: CircularReader) -> Self {
        Self::with_registry(reader, CallbackRegistry::new())
    }

    pub fn with_registry(reader: CircularReader, callbacks: CallbackRegistry) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            callbacks,
        }
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    pub fn register_event(&mut self) -> u32 {
        self.callbacks.register_event()
    }

    pub fn register_callback(&mut self, name: &str, callback: EventCallback) -> u32 {
        self.callbacks.register_callback(name, callback)
    }

    /// Events received but not yet consumed, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &PendingEvent> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn next_word(&mut self, what: &'static str) -> Result<u32, EventQueueError> {
        self.reader.read().ok_or(EventQueueError::Truncated(what))
    }

    fn read_event_remainder(&mut self) -> Result<(), EventQueueError> {
        let event_id = self.next_word("event id")?;
        let argc = self.next_word("event argument count")?;
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(self.next_word("event argument")?);
        }

        if !self.callbacks.is_registered(event_id) {
            return Err(EventQueueError::UnregisteredEvent(event_id));
        }

        trace!(event_id, argc, "event arrived");
        self.pending.push_back(PendingEvent { event_id, args });
        Ok(())
    }

    fn read_malloc_remainder(
        &mut self,
        alloc: &mut dyn RemoteAllocator,
    ) -> Result<(), EventQueueError> {
        let request_id = self.next_word("malloc request id")?;
        let size = self.next_word("malloc size")?;
        let addr = alloc.malloc(size)?;
        debug!(request_id, size, addr, "served remote malloc");
        alloc.complete(request_id, addr)
    }

    fn read_command_remainder(
        &mut self,
        marker: u32,
        alloc: &mut dyn RemoteAllocator,
    ) -> Result<(), EventQueueError> {
        match marker {
            EVENT_MARKER => self.read_event_remainder(),
            MALLOC_MARKER => self.read_malloc_remainder(alloc),
            other => Err(EventQueueError::BadMarker(other)),
        }
    }

    /// Decode every message currently in the buffer without blocking.
    fn drain(&mut self, alloc: &mut dyn RemoteAllocator) -> Result<(), EventQueueError> {
        while let Some(marker) = self.reader.read() {
            self.read_command_remainder(marker, alloc)?;
        }
        Ok(())
    }

    fn take_pending(&mut self, filter: Option<u32>) -> Option<PendingEvent> {
        match filter {
            None => self.pending.pop_front(),
            Some(id) => {
                let index = self.pending.iter().position(|e| e.event_id == id)?;
                self.pending.remove(index)
            }
        }
    }

    /// Wait for an event.
    ///
    /// With `filter` set, returns the first pending event with that id, even
    /// if older events of other ids are queued ahead of it. Without a filter,
    /// returns the oldest pending event. Blocks until a matching event
    /// arrives. Callbacks are never invoked from here.
    pub fn wait_event(
        &mut self,
        filter: Option<u32>,
        alloc: &mut dyn RemoteAllocator,
    ) -> Result<(u32, Vec<u32>), EventQueueError> {
        loop {
            self.drain(alloc)?;

            if let Some(event) = self.take_pending(filter) {
                return Ok((event.event_id, event.args));
            }

            let marker = self.reader.read_wait();
            self.read_command_remainder(marker, alloc)?;
        }
    }

    /// Drain the buffer, then run the callback of every pending event that
    /// has one, in arrival order.
    ///
    /// Events whose id is reserved but not yet bound stay pending. Returns the
    /// number of callbacks invoked.
    pub fn process_incoming_commands(
        &mut self,
        alloc: &mut dyn RemoteAllocator,
    ) -> Result<usize, EventQueueError> {
        self.drain(alloc)?;

        // Events are removed one at a time, so a panicking callback leaves
        // the events behind it pending and in order.
        let mut dispatched = 0;
        let mut i = 0;
        while i < self.pending.len() {
            if !self.callbacks.is_bound(self.pending[i].event_id) {
                i += 1;
                continue;
            }
            let Some(event) = self.pending.remove(i) else {
                break;
            };
            if let Some(callback) = self.callbacks.callback_mut(event.event_id) {
                callback(event.event_id, &event.args);
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }
}
