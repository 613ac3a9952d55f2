//! Worker-side stand-ins for foreground consoles.
//!
//! A [`ProxyRegistry`] turns a native call (console id, method name,
//! argument words) into the matching cross-thread operation:
//! fire-and-forget calls become one request frame, synchronous calls send a
//! frame and block on the console's [`Completion`], key reads come from the
//! console's key ring and property reads are answered from the snapshot
//! taken at setup.

use crate::bundle::{ProxyBundle, ProxyParams};
use crate::completion::Completion;
use crate::error::ConsoleError;
use crate::frame::{ConsoleCall, RequestWriter};
use crate::method::{CallShape, ConsoleClass, ConsoleMethod};
use crate::props::ConsoleProps;
use std::collections::BTreeMap;
use tandem_ipc::CircularReader;
use tandem_mem::Memory;
use tracing::{debug, trace, warn};

pub struct ConsoleProxy {
    id: i32,
    class: ConsoleClass,
    props: ConsoleProps,
    completion: Completion,
    keys: Option<CircularReader>,
}

impl ConsoleProxy {
    fn from_params(params: &ProxyParams) -> Result<Self, ConsoleError> {
        let class: ConsoleClass = params.class_name.parse()?;
        let keys = match (&params.keys, class.has_key_ring()) {
            (Some(ring), true) => Some(ring.reader()?),
            (None, true) => return Err(ConsoleError::MissingKeyRing(params.id)),
            (_, false) => None,
        };
        Ok(Self {
            id: params.id,
            class,
            props: params.props.clone(),
            completion: Completion::from_handle(params.completion.clone()),
            keys,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn class(&self) -> ConsoleClass {
        self.class
    }

    pub fn props(&self) -> &ConsoleProps {
        &self.props
    }

    /// Property value, or 0 for a property the console does not publish.
    pub fn get_prop(&self, name: &str) -> i32 {
        match self.props.get(name) {
            Some(value) => value,
            None => {
                warn!(id = self.id, class = %self.class, name, "unknown console property");
                0
            }
        }
    }

    fn keys(&mut self) -> Result<&mut CircularReader, ConsoleError> {
        self.keys
            .as_mut()
            .ok_or(ConsoleError::MissingKeyRing(self.id))
    }

    /// Block until a key arrives.
    pub fn char_in(&mut self) -> Result<u32, ConsoleError> {
        Ok(self.keys()?.read_wait())
    }

    /// Next key, or 0 when none is waiting.
    pub fn inkey(&mut self) -> Result<u32, ConsoleError> {
        Ok(self.keys()?.read().unwrap_or(0))
    }
}

impl std::fmt::Debug for ConsoleProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProxy")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("props", &self.props)
            .finish()
    }
}

pub struct ProxyRegistry {
    proxies: BTreeMap<i32, ConsoleProxy>,
    names: BTreeMap<String, i32>,
    requests: RequestWriter,
}

impl ProxyRegistry {
    /// Build every proxy described by `bundle` and take the writer end of its
    /// request ring.
    pub fn from_bundle(bundle: &ProxyBundle) -> Result<Self, ConsoleError> {
        let proxies = bundle
            .consoles
            .iter()
            .map(|params| Ok((params.id, ConsoleProxy::from_params(params)?)))
            .collect::<Result<BTreeMap<_, _>, ConsoleError>>()?;
        debug!(consoles = proxies.len(), "console proxies ready");
        Ok(Self {
            proxies,
            names: bundle.names.clone(),
            requests: RequestWriter::new(bundle.requests.writer()?),
        })
    }

    pub fn proxy(&self, id: i32) -> Option<&ConsoleProxy> {
        self.proxies.get(&id)
    }

    pub fn proxies(&self) -> impl Iterator<Item = &ConsoleProxy> {
        self.proxies.values()
    }

    pub fn requests_mut(&mut self) -> &mut RequestWriter {
        &mut self.requests
    }

    /// Console id registered under `name`, or -1.
    pub fn get_con_id_from_name(&self, name: &str) -> i32 {
        self.names.get(name).copied().unwrap_or(-1)
    }

    /// Perform `method_name` on console `id` with the native argument words
    /// `args` and return the result word (0 for calls without a result).
    ///
    /// Synchronous methods block until the foreground has executed them, and
    /// `charIn` blocks until a key arrives.
    pub fn dispatch(
        &mut self,
        mem: &dyn Memory,
        id: i32,
        method_name: &str,
        args: &[u32],
    ) -> Result<u32, ConsoleError> {
        let method: ConsoleMethod = method_name.parse()?;
        if !method.is_device_method() {
            return Err(ConsoleError::NotADeviceMethod(method));
        }
        if args.len() != method.arity() {
            return Err(ConsoleError::ArgCount {
                method,
                expected: method.arity(),
                found: args.len(),
            });
        }
        let proxy = self
            .proxies
            .get_mut(&id)
            .ok_or(ConsoleError::UnknownDevice(id))?;
        if !proxy.class.supports(method) {
            return Err(ConsoleError::UnsupportedMethod {
                id,
                class: proxy.class,
                method,
            });
        }
        trace!(id, %method, "console dispatch");

        match method.shape() {
            CallShape::Local => {
                let name = mem.read_cstr(args[0])?;
                Ok(proxy.get_prop(&name) as u32)
            }
            CallShape::KeyRing => match method {
                ConsoleMethod::CharIn => proxy.char_in(),
                _ => proxy.inkey(),
            },
            CallShape::FireAndForget => {
                let call = ConsoleCall::from_args(method, mem, args)?;
                self.requests.send(id, call)?;
                Ok(0)
            }
            CallShape::Synchronous => {
                let call = ConsoleCall::from_args(method, mem, args)?;
                proxy.completion.reset();
                self.requests.send(id, call)?;
                Ok(proxy.completion.wait())
            }
        }
    }
}

impl std::fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRegistry")
            .field("proxies", &self.proxies)
            .field("names", &self.names)
            .finish()
    }
}
