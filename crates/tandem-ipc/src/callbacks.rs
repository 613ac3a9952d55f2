//! Event id issuance and callback bindings for the receiving side of the
//! event queue.

use crate::event_queue::{EVENT_MARKER, MALLOC_MARKER};
use std::collections::HashMap;
use tracing::debug;

/// Handler invoked with the event id and its argument words.
pub type EventCallback = Box<dyn FnMut(u32, &[u32])>;

struct Registration {
    name: Option<String>,
    callback: Option<EventCallback>,
}

/// Owner of the event id namespace.
///
/// Ids are issued monotonically from an internal counter. `0`, `1` and the
/// queue marker words are never issued.
pub struct CallbackRegistry {
    last_id: u32,
    entries: HashMap<u32, Registration>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            last_id: 1,
            entries: HashMap::new(),
        }
    }

    fn next_id(&mut self) -> u32 {
        loop {
            self.last_id = self.last_id.wrapping_add(1);
            let id = self.last_id;
            let reserved = matches!(id, 0 | 1 | EVENT_MARKER | MALLOC_MARKER);
            if !reserved && !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    /// Reserve an event id whose handler is not known yet.
    pub fn register_event(&mut self) -> u32 {
        let id = self.next_id();
        self.entries.insert(
            id,
            Registration {
                name: None,
                callback: None,
            },
        );
        debug!(event_id = id, "reserved event id");
        id
    }

    /// Reserve an event id and bind `callback` to it.
    pub fn register_callback(&mut self, name: &str, callback: EventCallback) -> u32 {
        let id = self.next_id();
        self.entries.insert(
            id,
            Registration {
                name: Some(name.to_owned()),
                callback: Some(callback),
            },
        );
        debug!(event_id = id, name, "registered event callback");
        id
    }

    /// Bind a handler to an id previously reserved with
    /// [`register_event`](Self::register_event). Returns `false` if `id` was
    /// never issued.
    pub fn bind(&mut self, id: u32, callback: EventCallback) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.callback = Some(callback);
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn is_bound(&self, id: u32) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|entry| entry.callback.is_some())
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.entries.get(&id).and_then(|entry| entry.name.as_deref())
    }

    pub(crate) fn callback_mut(&mut self, id: u32) -> Option<&mut EventCallback> {
        self.entries
            .get_mut(&id)
            .and_then(|entry| entry.callback.as_mut())
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("last_id", &self.last_id)
            .field("registered", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_skip_sentinels() {
        let mut reg = CallbackRegistry::new();
        let a = reg.register_event();
        let b = reg.register_callback("tick", Box::new(|_, _| {}));
        let c = reg.register_event();
        assert_eq!((a, b, c), (2, 3, 4));
        assert!(reg.is_registered(a));
        assert!(!reg.is_bound(a));
        assert!(reg.is_bound(b));
        assert_eq!(reg.name(b), Some("tick"));
        assert!(!reg.is_registered(0));
        assert!(!reg.is_registered(1));
    }

    #[test]
    fn marker_values_are_never_issued() {
        let mut reg = CallbackRegistry::new();
        reg.last_id = MALLOC_MARKER - 1;
        assert_eq!(reg.register_event(), MALLOC_MARKER + 1);
        reg.last_id = EVENT_MARKER - 1;
        assert_eq!(reg.register_event(), EVENT_MARKER + 1);
    }

    #[test]
    fn bind_attaches_handler_to_reserved_id() {
        let mut reg = CallbackRegistry::new();
        let id = reg.register_event();
        assert!(reg.bind(id, Box::new(|_, _| {})));
        assert!(reg.is_bound(id));
        assert!(!reg.bind(id + 100, Box::new(|_, _| {})));
    }
}
