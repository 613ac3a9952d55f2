//! Worker side: console proxies plus the receiving end of the event queue.

use crate::bundle::ProxyBundle;
use crate::error::ConsoleError;
use crate::frame::RequestWriter;
use crate::proxy::ProxyRegistry;
use tandem_ipc::{EventCallback, EventQueueError, EventQueueReceive, RemoteAllocator};
use tandem_mem::{Heap, Memory};
use tracing::trace;

/// Alignment of blocks handed out for remote allocation requests.
const MALLOC_ALIGN: u32 = 8;

/// Serves allocation requests from the worker's heap and replies over the
/// request ring.
struct HeapAllocator<'a> {
    heap: &'a mut Heap,
    requests: &'a mut RequestWriter,
}

impl RemoteAllocator for HeapAllocator<'_> {
    fn malloc(&mut self, size: u32) -> Result<u32, EventQueueError> {
        self.heap
            .alloc(size, MALLOC_ALIGN)
            .ok_or(EventQueueError::AllocationFailed { size })
    }

    fn complete(&mut self, request_id: u32, addr: u32) -> Result<(), EventQueueError> {
        self.requests
            .malloc_reply(request_id, addr)
            .map_err(|e| EventQueueError::ReplyFailed {
                request_id,
                reason: e.to_string(),
            })
    }
}

/// Everything native code on the worker thread talks to.
///
/// Built on the worker thread from the foreground's [`ProxyBundle`]; it holds
/// event callbacks, which stay on the thread that registered them.
pub struct WorkerEndpoint {
    proxies: ProxyRegistry,
    events: EventQueueReceive,
    heap: Heap,
}

impl WorkerEndpoint {
    /// `heap` is the region of worker memory that remote allocation
    /// requests are served from.
    pub fn from_bundle(bundle: &ProxyBundle, heap: Heap) -> Result<Self, ConsoleError> {
        Ok(Self {
            proxies: ProxyRegistry::from_bundle(bundle)?,
            events: EventQueueReceive::new(bundle.events.reader()?),
            heap,
        })
    }

    pub fn proxies(&self) -> &ProxyRegistry {
        &self.proxies
    }

    pub fn proxies_mut(&mut self) -> &mut ProxyRegistry {
        &mut self.proxies
    }

    pub fn events(&self) -> &EventQueueReceive {
        &self.events
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Release a block handed out for a remote allocation request, once the
    /// foreground is done with it.
    pub fn free(&mut self, addr: u32) -> Result<(), ConsoleError> {
        let size = self
            .heap
            .free(addr)
            .ok_or(ConsoleError::UnknownAllocation(addr))?;
        trace!(addr, size, "remote allocation freed");
        Ok(())
    }

    /// See [`ProxyRegistry::dispatch`].
    pub fn dispatch(
        &mut self,
        mem: &dyn Memory,
        id: i32,
        method_name: &str,
        args: &[u32],
    ) -> Result<u32, ConsoleError> {
        self.proxies.dispatch(mem, id, method_name, args)
    }

    /// Console id for the NUL-terminated name at `name_ptr`, or -1.
    pub fn get_con_id_from_name(
        &self,
        mem: &dyn Memory,
        name_ptr: u32,
    ) -> Result<i32, ConsoleError> {
        let name = mem.read_cstr(name_ptr)?;
        Ok(self.proxies.get_con_id_from_name(&name))
    }

    pub fn register_event(&mut self) -> u32 {
        self.events.register_event()
    }

    pub fn register_callback(&mut self, name: &str, callback: EventCallback) -> u32 {
        self.events.register_callback(name, callback)
    }

    pub fn bind(&mut self, event_id: u32, callback: EventCallback) -> bool {
        self.events.callbacks_mut().bind(event_id, callback)
    }

    /// Block until an event (with id `filter`, if given) arrives. Allocation
    /// requests arriving meanwhile are served.
    pub fn wait_event(&mut self, filter: Option<u32>) -> Result<(u32, Vec<u32>), ConsoleError> {
        let mut alloc = HeapAllocator {
            heap: &mut self.heap,
            requests: self.proxies.requests_mut(),
        };
        Ok(self.events.wait_event(filter, &mut alloc)?)
    }

    /// Serve queued allocation requests and run the callbacks of queued
    /// events. Returns the number of callbacks run.
    pub fn process_incoming_commands(&mut self) -> Result<usize, ConsoleError> {
        let mut alloc = HeapAllocator {
            heap: &mut self.heap,
            requests: self.proxies.requests_mut(),
        };
        Ok(self.events.process_incoming_commands(&mut alloc)?)
    }
}
