//! Cross-thread console and 2D-canvas bridge.
//!
//! Native code runs on a worker thread and talks to consoles owned by the
//! foreground thread. The pieces live in their own crates and are re-exported
//! here:
//!
//! - [`mem`]: the linear memory both threads address.
//! - [`ipc`]: signals, the shared circular buffer and the event queue.
//! - [`d2d`]: draw-sequence wire format, interpreter and builder.
//! - [`console`]: console host, proxies and the request protocol.

pub use tandem_console as console;
pub use tandem_d2d as d2d;
pub use tandem_ipc as ipc;
pub use tandem_mem as mem;

pub use tandem_console::{
    ConsoleError, ConsoleHost, ConsoleRegistry, ProxyBundle, TandemConfig, WorkerEndpoint,
};
pub use tandem_mem::{Memory, SharedMemory};
