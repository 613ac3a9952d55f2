//! Foreground side: owns the consoles and executes requests from the worker.

use crate::bundle::{ProxyBundle, ProxyParams};
use crate::completion::Completion;
use crate::config::TandemConfig;
use crate::console::{Console, ConsoleRegistry};
use crate::error::ConsoleError;
use crate::frame::{ConsoleCall, Request};
use crate::method::{CallShape, ConsoleMethod};
use std::collections::{BTreeMap, HashMap};
use tandem_ipc::{CircularHandle, CircularReader, CircularWriter, EventQueueSend};
use tandem_mem::Memory;
use tracing::{debug, trace, warn};

struct DeviceChannels {
    completion: Completion,
    keys: Option<CircularWriter>,
}

/// The foreground half of the console protocol.
///
/// The host never blocks on the worker: [`process_incoming`] drains whatever
/// requests are already queued and returns.
///
/// [`process_incoming`]: Self::process_incoming
pub struct ConsoleHost {
    registry: ConsoleRegistry,
    devices: BTreeMap<i32, DeviceChannels>,
    bundle: ProxyBundle,
    requests: CircularReader,
    events: EventQueueSend,
    malloc_replies: HashMap<u32, u32>,
}

impl ConsoleHost {
    /// Create the shared rings and per-console channels for every console in
    /// `registry`.
    pub fn new(registry: ConsoleRegistry, config: &TandemConfig) -> Result<Self, ConsoleError> {
        config.validate()?;
        let request_ring = CircularHandle::new(config.request_ring_words);
        let event_ring = CircularHandle::new(config.event_queue_words);
        let requests = request_ring.reader()?;
        let events = EventQueueSend::new(event_ring.writer()?);

        let mut devices = BTreeMap::new();
        let mut consoles = Vec::with_capacity(registry.len());
        for (id, console) in registry.iter() {
            let class = console.class();
            let completion = Completion::new();
            let (keys, key_ring) = if class.has_key_ring() {
                let ring = CircularHandle::new(config.key_ring_words);
                (Some(ring.writer()?), Some(ring))
            } else {
                (None, None)
            };
            consoles.push(ProxyParams {
                class_name: class.name().to_owned(),
                id,
                props: console.props(),
                completion: completion.handle(),
                keys: key_ring,
            });
            devices.insert(id, DeviceChannels { completion, keys });
        }

        let bundle = ProxyBundle {
            requests: request_ring,
            events: event_ring,
            consoles,
            names: registry.names().clone(),
        };
        debug!(consoles = devices.len(), "console host ready");
        Ok(Self {
            registry,
            devices,
            bundle,
            requests,
            events,
            malloc_replies: HashMap::new(),
        })
    }

    /// Setup data for the worker. Each ring end in it can be taken once.
    pub fn proxy_bundle(&self) -> ProxyBundle {
        self.bundle.clone()
    }

    pub fn registry(&self) -> &ConsoleRegistry {
        &self.registry
    }

    pub fn console<T: Console>(&self, id: i32) -> Option<&T> {
        self.registry.downcast_ref(id)
    }

    pub fn console_mut<T: Console>(&mut self, id: i32) -> Option<&mut T> {
        self.registry.downcast_mut(id)
    }

    /// Execute every request currently queued by the worker. Returns the
    /// number of requests handled.
    pub fn process_incoming(&mut self, mem: &mut dyn Memory) -> Result<usize, ConsoleError> {
        let mut handled = 0;
        while let Some(request) = Request::read_from(&mut self.requests)? {
            match request {
                Request::Console { device_id, call } => self.execute(mem, device_id, call)?,
                Request::MallocReply { request_id, addr } => {
                    trace!(request_id, addr, "malloc reply received");
                    if self.malloc_replies.insert(request_id, addr).is_some() {
                        warn!(request_id, "duplicate malloc reply; keeping the newest");
                    }
                }
            }
            handled += 1;
        }
        Ok(handled)
    }

    fn execute(
        &mut self,
        mem: &mut dyn Memory,
        id: i32,
        call: ConsoleCall,
    ) -> Result<(), ConsoleError> {
        let method = call.method();
        let console = self
            .registry
            .get_box_mut(id)
            .ok_or(ConsoleError::UnknownDevice(id))?;
        let class = console.class();
        if !class.supports(method) {
            return Err(ConsoleError::UnsupportedMethod { id, class, method });
        }
        trace!(id, %method, "executing console request");
        let result = console.handle(call, mem)?;

        if method.shape() == CallShape::Synchronous {
            let channels = self
                .devices
                .get(&id)
                .ok_or(ConsoleError::UnknownDevice(id))?;
            channels.completion.complete(result);
        }
        Ok(())
    }

    /// Queue a key for console `id`'s `charIn`.
    pub fn key_down(&mut self, id: i32, key: u32) -> Result<(), ConsoleError> {
        let class = self
            .registry
            .get(id)
            .ok_or(ConsoleError::UnknownDevice(id))?
            .class();
        let keys = self
            .devices
            .get_mut(&id)
            .and_then(|d| d.keys.as_mut())
            .ok_or(ConsoleError::UnsupportedMethod {
                id,
                class,
                method: ConsoleMethod::CharIn,
            })?;
        keys.write(key)?;
        Ok(())
    }

    pub fn post_event(&mut self, event_id: u32, args: &[u32]) -> Result<(), ConsoleError> {
        Ok(self.events.post_event(event_id, args)?)
    }

    /// Ask the worker to allocate `size` bytes. The address arrives later
    /// through [`take_malloc_reply`](Self::take_malloc_reply).
    pub fn post_malloc(&mut self, request_id: u32, size: u32) -> Result<(), ConsoleError> {
        Ok(self.events.post_malloc(request_id, size)?)
    }

    pub fn take_malloc_reply(&mut self, request_id: u32) -> Option<u32> {
        self.malloc_replies.remove(&request_id)
    }
}

impl std::fmt::Debug for ConsoleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleHost")
            .field("registry", &self.registry)
            .field("pending_requests", &self.requests.len())
            .field("malloc_replies", &self.malloc_replies.len())
            .finish()
    }
}
