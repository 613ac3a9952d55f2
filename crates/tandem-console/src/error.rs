use crate::method::{ConsoleClass, ConsoleMethod};
use tandem_d2d::DrawError;
use tandem_ipc::{CircularBufferError, EventQueueError};
use tandem_mem::MemoryError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsoleError {
    #[error("unknown console method {0:?}")]
    UnknownMethod(String),
    #[error("unknown console class {0:?}")]
    UnknownClass(String),
    #[error("no console with id {0}")]
    UnknownDevice(i32),
    #[error("console {id} is a {class}, which does not support {method} (wrong console type?)")]
    UnsupportedMethod {
        id: i32,
        class: ConsoleClass,
        method: ConsoleMethod,
    },
    #[error("{class} cannot execute {method}")]
    NotHandled {
        class: ConsoleClass,
        method: ConsoleMethod,
    },
    #[error("{0} is not a console method")]
    NotADeviceMethod(ConsoleMethod),
    #[error("{method} takes {expected} argument words, got {found}")]
    ArgCount {
        method: ConsoleMethod,
        expected: usize,
        found: usize,
    },
    #[error("{0} is answered on the worker and never sent as a request")]
    NotForwarded(ConsoleMethod),
    #[error("console {0} accepts key input but was set up without a key ring")]
    MissingKeyRing(i32),
    #[error("console name {0:?} is already registered")]
    DuplicateName(String),
    #[error("0x{0:08x} is not a live remote allocation")]
    UnknownAllocation(u32),

    #[error("expected a console or malloc-reply marker, found 0x{0:08x}")]
    BadMarker(u32),
    #[error("request truncated: missing {0}")]
    Truncated(&'static str),
    #[error("unknown console method tag {0}")]
    UnknownMethodTag(u32),
    #[error("{method} request has {extra} trailing payload words")]
    TrailingWords { method: ConsoleMethod, extra: usize },

    #[error("cell {location} is outside the {size}-cell terminal")]
    CellOutOfRange { location: u32, size: u32 },
    #[error("block pixel ({x}, {y}) is outside the {width}x{height} graphics grid")]
    PixelOutOfRange {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Buffer(#[from] CircularBufferError),
    #[error(transparent)]
    Queue(#[from] EventQueueError),
    #[error(transparent)]
    Draw(#[from] DrawError),
}
