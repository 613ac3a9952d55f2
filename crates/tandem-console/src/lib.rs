//! Consoles owned by the foreground thread and their worker-side proxies.
//!
//! Setup: the foreground registers its consoles in a [`ConsoleRegistry`] and
//! builds a [`ConsoleHost`], whose [`ProxyBundle`] is sent to the worker. The
//! worker builds a [`WorkerEndpoint`] from the bundle and performs console
//! operations through it; the host executes the forwarded calls whenever it
//! drains its request ring.

mod bundle;
mod completion;
mod config;
mod console;
pub mod consoles;
mod error;
mod frame;
mod host;
mod method;
mod props;
mod proxy;
mod worker;

pub use bundle::{ProxyBundle, ProxyParams};
pub use completion::{Completion, CompletionHandle};
pub use config::TandemConfig;
pub use console::{Console, ConsoleRegistry};
pub use consoles::{CanvasConsole, DebugConsole, TerminalConsole};
pub use error::ConsoleError;
pub use frame::{ConsoleCall, Request, RequestWriter, CONSOLE_MARKER, MALLOC_REPLY_MARKER};
pub use host::ConsoleHost;
pub use method::{CallShape, ConsoleClass, ConsoleMethod};
pub use props::{ConsoleProps, IoTypes};
pub use proxy::{ConsoleProxy, ProxyRegistry};
pub use worker::WorkerEndpoint;
