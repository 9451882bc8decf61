//! The per-page endpoint context and its public facade.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use pe_protocol::{Envelope, INIT_KEY, Identity, ProtocolVersion};
use pe_runtime::{ListenerId, MessageEvent, Page, Window};
use serde_json::Value;

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::handlers::{Api, Handler, HandlerMap};
use crate::pending::PendingRequest;
use crate::transport::{ANY_ORIGIN, Transport};

#[derive(Default)]
struct State {
	handlers: HandlerMap,
	pending: HashMap<u64, PendingRequest>,
	/// Never reset, so a late response to a pre-reset request cannot match a new one.
	next_id: u64,
	listener: Option<ListenerId>,
	version: Option<ProtocolVersion>,
	identity: Identity,
}

pub(crate) struct Shared {
	page: Rc<dyn Page>,
	config: EndpointConfig,
	state: RefCell<State>,
}

/// Messaging context for one page.
///
/// Holds what would otherwise be page-global: the handler registry, the
/// in-flight request table, the attached listener and the handshake identity.
/// Two endpoints never see each other's state. Cloning yields another handle
/// to the same context.
#[derive(Clone)]
pub struct Endpoint {
	shared: Rc<Shared>,
}

impl Endpoint {
	pub fn new(page: Rc<dyn Page>) -> Self {
		Self::with_config(page, EndpointConfig::default())
	}

	pub fn with_config(page: Rc<dyn Page>, config: EndpointConfig) -> Self {
		Self {
			shared: Rc::new(Shared {
				page,
				config,
				state: RefCell::new(State::default()),
			}),
		}
	}

	pub fn page(&self) -> &Rc<dyn Page> {
		&self.shared.page
	}

	pub fn config(&self) -> &EndpointConfig {
		&self.shared.config
	}

	/// Validates `version`, makes it current and attaches the `message`
	/// listener if it is not attached yet.
	pub fn ensure(&self, version: &str) -> Result<&Self> {
		let version: ProtocolVersion = version.parse()?;
		self.shared.state.borrow_mut().version = Some(version);

		if self.shared.state.borrow().listener.is_some() {
			return Ok(self);
		}

		let weak: Weak<Shared> = Rc::downgrade(&self.shared);
		let id = self.shared.page.add_message_listener(Rc::new(
			move |event: &MessageEvent| -> pe_runtime::Result<()> {
				let Some(shared) = weak.upgrade() else {
					return Ok(());
				};
				Endpoint { shared }
					.dispatch(event)
					.map_err(|e| pe_runtime::Error::Listener(e.to_string()))
			},
		));
		self.shared.state.borrow_mut().listener = Some(id);
		tracing::debug!(%version, origin = %self.shared.page.origin(), "endpoint listening");

		Ok(self)
	}

	/// [`ensure`](Self::ensure) with the configured version.
	pub fn ensure_default(&self) -> Result<&Self> {
		self.ensure(self.shared.config.version.as_str())
	}

	/// Registers `handler` under `key` exactly as given. Replaces any previous handler.
	pub fn on<F>(&self, key: impl Into<String>, handler: F) -> &Self
	where
		F: Fn(Envelope, Transport) + 'static,
	{
		self.register(key.into(), Rc::new(handler));
		self
	}

	/// Registers every function member of `api` under its name.
	pub fn define(&self, api: &Api) -> &Self {
		for (key, handler) in api.functions() {
			self.register(key.to_string(), Rc::clone(handler));
		}
		self
	}

	/// Registers the handshake handler for the namespaced `init` key.
	///
	/// The handshake body's `uid` and `pluginId` become this endpoint's
	/// identity before `initializer` runs. The initializer receives the body's
	/// `initialData`, or the whole body when that field is absent.
	pub fn on_init<F>(&self, initializer: F) -> Result<&Self>
	where
		F: Fn(Value, Transport) + 'static,
	{
		let key = self.require_version()?.qualify(INIT_KEY);
		self.on(key, move |message: Envelope, transport: Transport| {
			transport.endpoint().set_identity(Identity::from_body(&message.body));
			let data = match message.body {
				Value::Object(mut body) if body.contains_key("initialData") => {
					body.remove("initialData").unwrap_or(Value::Null)
				}
				body => body,
			};
			initializer(data, transport);
		});
		Ok(self)
	}

	/// Sends the handshake to `target`. Nothing is tracked and no reply is expected.
	pub fn init(&self, target: &Rc<dyn Window>, data: Value) -> Result<()> {
		let key = self.require_version()?.qualify(INIT_KEY);
		let id = self.next_id();
		tracing::debug!(id, "sending init");
		target.post_message(&Envelope::init(id, key, data).to_value(), ANY_ORIGIN)?;
		Ok(())
	}

	/// Outbound transport to `target`.
	pub fn transport(&self, target: Rc<dyn Window>) -> Transport {
		Transport::new(self, target)
	}

	/// Shorthand for `self.transport(target).request(key, data)`.
	pub fn request(&self, target: Rc<dyn Window>, key: &str, data: Value) -> Result<PendingRequest> {
		self.transport(target).request(key, data)
	}

	/// Drops handlers, pending requests, identity and version, and detaches the listener.
	///
	/// Pending callbacks are not notified; only [`ResponseFuture`](crate::ResponseFuture)s
	/// resolve, with [`Error::Abandoned`]. Meant for isolating tests, not for use
	/// while requests are in flight.
	pub fn reset(&self) {
		let (listener, dropped) = {
			let mut state = self.shared.state.borrow_mut();
			state.handlers.clear();
			state.version = None;
			state.identity = Identity::default();
			let dropped: Vec<PendingRequest> = state.pending.drain().map(|(_, p)| p).collect();
			(state.listener.take(), dropped)
		};
		if !dropped.is_empty() {
			tracing::debug!(dropped = dropped.len(), "reset dropped pending requests");
		}
		for pending in dropped {
			pending.abandon();
		}
		if let Some(id) = listener {
			self.shared.page.remove_message_listener(id);
		}
	}

	pub fn version(&self) -> Option<ProtocolVersion> {
		self.shared.state.borrow().version
	}

	pub fn identity(&self) -> Identity {
		self.shared.state.borrow().identity.clone()
	}

	pub fn is_attached(&self) -> bool {
		self.shared.state.borrow().listener.is_some()
	}

	pub fn has_handler(&self, key: &str) -> bool {
		self.shared.state.borrow().handlers.contains_key(key)
	}

	/// Number of requests still waiting for a response.
	pub fn pending_count(&self) -> usize {
		self.shared.state.borrow().pending.len()
	}

	pub(crate) fn handler(&self, key: &str) -> Option<Handler> {
		self.shared.state.borrow().handlers.get(key).cloned()
	}

	pub(crate) fn set_identity(&self, identity: Identity) {
		tracing::debug!(uid = ?identity.uid, plugin_id = ?identity.plugin_id, "identity set by init");
		self.shared.state.borrow_mut().identity = identity;
	}

	/// Allocates an id and records a pending request under it.
	pub(crate) fn track_request(&self) -> PendingRequest {
		let id = self.next_id();
		let pending = PendingRequest::new(id);
		self.shared.state.borrow_mut().pending.insert(id, pending.clone());
		pending
	}

	pub(crate) fn take_pending(&self, id: u64) -> Option<PendingRequest> {
		self.shared.state.borrow_mut().pending.remove(&id)
	}

	/// `"null"`, the page's own origin, or a configured extra origin.
	pub(crate) fn accepts_origin(&self, origin: &str) -> bool {
		origin == pe_runtime::NULL_ORIGIN
			|| origin == self.shared.page.origin()
			|| self.shared.config.accepted_origins.iter().any(|o| o == origin)
	}

	fn next_id(&self) -> u64 {
		let mut state = self.shared.state.borrow_mut();
		let id = state.next_id;
		state.next_id += 1;
		id
	}

	fn require_version(&self) -> Result<ProtocolVersion> {
		self.version().ok_or(Error::NotEnsured)
	}

	fn register(&self, key: String, handler: Handler) {
		let replaced = self.shared.state.borrow_mut().handlers.insert(key.clone(), handler);
		if replaced.is_some() {
			tracing::debug!(%key, "handler replaced");
		}
	}
}

impl std::fmt::Debug for Endpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.shared.state.borrow();
		f.debug_struct("Endpoint")
			.field("origin", &self.shared.page.origin())
			.field("version", &state.version)
			.field("attached", &state.listener.is_some())
			.field("handlers", &state.handlers.len())
			.field("pending", &state.pending.len())
			.field("identity", &state.identity)
			.finish()
	}
}
