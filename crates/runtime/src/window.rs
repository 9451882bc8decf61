//! Window and page traits.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::Result;

/// Origin reported for sandboxed frames and opaque documents.
pub const NULL_ORIGIN: &str = "null";

/// A handle on another window.
pub trait Window {
	/// Queues `data` for delivery to the window's `message` listeners.
	///
	/// Delivery is dropped silently when `target_origin` is neither `"*"` nor
	/// the receiving window's origin.
	fn post_message(&self, data: &Value, target_origin: &str) -> Result<()>;
}

/// Deferred unit of work scheduled with [`Page::defer`].
pub type Task = Box<dyn FnOnce()>;

/// Listener attached to a page's `message` event.
pub type MessageListener = Rc<dyn Fn(&MessageEvent) -> Result<()>>;

/// Identifies an attached listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The local window an endpoint lives in.
pub trait Page {
	/// Serialized origin, e.g. `"https://ci.example.com"` or `"null"`.
	fn origin(&self) -> String;

	fn add_message_listener(&self, listener: MessageListener) -> ListenerId;

	/// Returns false when `id` was not attached.
	fn remove_message_listener(&self, id: ListenerId) -> bool;

	/// Runs `task` after the current turn, like a zero-delay timer.
	fn defer(&self, task: Task);

	fn listener_count(&self) -> usize;
}

/// A delivered cross-window message.
#[derive(Clone)]
pub struct MessageEvent {
	/// Origin of the sending document.
	pub origin: String,
	/// Window that sent the message, usable for replies.
	pub source: Option<Rc<dyn Window>>,
	pub data: Value,
}

impl MessageEvent {
	pub fn new(origin: impl Into<String>, source: Option<Rc<dyn Window>>, data: Value) -> Self {
		Self {
			origin: origin.into(),
			source,
			data,
		}
	}
}

impl fmt::Debug for MessageEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MessageEvent")
			.field("origin", &self.origin)
			.field("source", &self.source.as_ref().map(|_| "Window"))
			.field("data", &self.data)
			.finish()
	}
}
