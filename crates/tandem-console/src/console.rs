use crate::error::ConsoleError;
use crate::frame::ConsoleCall;
use crate::method::ConsoleClass;
use crate::props::ConsoleProps;
use std::any::Any;
use std::collections::BTreeMap;
use tandem_mem::Memory;
use tracing::debug;

/// A device owned by the foreground thread.
pub trait Console: Any {
    fn class(&self) -> ConsoleClass;

    /// Properties published to the worker when the proxy bundle is built.
    fn props(&self) -> ConsoleProps;

    /// Execute a forwarded call against this console.
    ///
    /// The returned word completes synchronous calls and is discarded for
    /// fire-and-forget ones.
    fn handle(&mut self, call: ConsoleCall, mem: &mut dyn Memory) -> Result<u32, ConsoleError>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Foreground registry of consoles. Ids are assigned in registration order,
/// starting at 1.
pub struct ConsoleRegistry {
    consoles: BTreeMap<i32, Box<dyn Console>>,
    names: BTreeMap<String, i32>,
    next_id: i32,
}

impl ConsoleRegistry {
    pub fn new() -> Self {
        Self {
            consoles: BTreeMap::new(),
            names: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn register(&mut self, console: Box<dyn Console>) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        debug!(id, class = %console.class(), "console registered");
        self.consoles.insert(id, console);
        id
    }

    /// Register a console that native code can look up by `name`.
    pub fn register_named(
        &mut self,
        name: &str,
        console: Box<dyn Console>,
    ) -> Result<i32, ConsoleError> {
        if self.names.contains_key(name) {
            return Err(ConsoleError::DuplicateName(name.to_owned()));
        }
        let id = self.register(console);
        self.names.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn get(&self, id: i32) -> Option<&dyn Console> {
        self.consoles.get(&id).map(|c| c.as_ref())
    }

    pub(crate) fn get_box_mut(&mut self, id: i32) -> Option<&mut Box<dyn Console>> {
        self.consoles.get_mut(&id)
    }

    pub fn downcast_ref<T: Console>(&self, id: i32) -> Option<&T> {
        self.consoles.get(&id)?.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Console>(&mut self, id: i32) -> Option<&mut T> {
        self.consoles.get_mut(&id)?.as_any_mut().downcast_mut()
    }

    pub fn id_from_name(&self, name: &str) -> Option<i32> {
        self.names.get(name).copied()
    }

    pub fn names(&self) -> &BTreeMap<String, i32> {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &dyn Console)> {
        self.consoles.iter().map(|(id, c)| (*id, c.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.consoles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consoles.is_empty()
    }
}

impl Default for ConsoleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.consoles.iter().map(|(id, c)| (id, c.class())))
            .finish()
    }
}
