//! What the foreground hands to the worker at setup.
//!
//! The bundle contains only shareable handles and plain data; the worker
//! builds its proxies from it and takes the ring ends it owns.

use crate::completion::CompletionHandle;
use crate::props::ConsoleProps;
use std::collections::BTreeMap;
use tandem_ipc::CircularHandle;

/// Everything needed to build the worker-side proxy of one console.
#[derive(Debug, Clone)]
pub struct ProxyParams {
    /// Console class name, e.g. `"TerminalConsole"`.
    pub class_name: String,
    pub id: i32,
    pub props: ConsoleProps,
    pub completion: CompletionHandle,
    /// Present for consoles that accept key input.
    pub keys: Option<CircularHandle>,
}

#[derive(Debug, Clone)]
pub struct ProxyBundle {
    /// Worker to foreground: console calls and allocation replies.
    pub requests: CircularHandle,
    /// Foreground to worker: events and allocation requests.
    pub events: CircularHandle,
    pub consoles: Vec<ProxyParams>,
    pub names: BTreeMap<String, i32>,
}
