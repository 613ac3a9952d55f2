//! Cross-thread synchronization primitives and the event queue built on them.
//!
//! Only two primitives exist: [`Signal`] (a one-word rendezvous flag) and the
//! single-producer/single-consumer [`circular`] word queue. Every higher level
//! protocol, including the event queue in this crate and the console RPC in
//! `tandem-console`, is layered on top of those two.

pub mod callbacks;
pub mod circular;
pub mod event_queue;
pub mod signal;

pub use callbacks::{CallbackRegistry, EventCallback};
pub use circular::{
    CircularBufferError, CircularHandle, CircularReader, CircularWriter, MAX_CAPACITY,
};
pub use event_queue::{
    EventQueueError, EventQueueReceive, EventQueueSend, PendingEvent, RemoteAllocator,
    EVENT_MARKER, MALLOC_MARKER,
};
pub use signal::{Signal, SignalHandle};
