//! Handler registry types.
//!
//! Handlers are keyed by their fully-qualified key; registering the same key
//! again replaces the previous handler. [`Api`] keeps insertion order so bulk
//! registration with [`Endpoint::define`](crate::Endpoint::define) is
//! deterministic.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use pe_protocol::Envelope;
use serde_json::Value;

use crate::transport::Transport;

/// Handler for an inbound request: `(message, transport)`.
pub type Handler = Rc<dyn Fn(Envelope, Transport)>;

/// Registered handlers by key.
pub(crate) type HandlerMap = HashMap<String, Handler>;

/// One property of an [`Api`] object.
#[derive(Clone)]
pub enum ApiMember {
	Function(Handler),
	/// Non-function property, skipped on registration.
	Value(Value),
}

impl std::fmt::Debug for ApiMember {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ApiMember::Function(_) => f.write_str("Function"),
			ApiMember::Value(v) => f.debug_tuple("Value").field(v).finish(),
		}
	}
}

/// A set of named members to register in bulk.
#[derive(Clone, Debug, Default)]
pub struct Api {
	members: IndexMap<String, ApiMember>,
}

impl Api {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a handler under `key`, replacing any earlier member with that name.
	pub fn function<F>(mut self, key: impl Into<String>, handler: F) -> Self
	where
		F: Fn(Envelope, Transport) + 'static,
	{
		self.members.insert(key.into(), ApiMember::Function(Rc::new(handler)));
		self
	}

	/// Adds a plain value under `key`.
	pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.members.insert(key.into(), ApiMember::Value(value.into()));
		self
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	/// Function members in insertion order.
	pub fn functions(&self) -> impl Iterator<Item = (&str, &Handler)> {
		self.members.iter().filter_map(|(key, member)| match member {
			ApiMember::Function(handler) => Some((key.as_str(), handler)),
			ApiMember::Value(_) => None,
		})
	}
}
