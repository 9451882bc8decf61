//! Inbound message dispatch.
//!
//! The page's `message` listener lands here. Anything another window sends is
//! untrusted: wrong origin, wrong shape, unknown type, missing key or missing
//! handler are all logged and dropped. The one hard failure is a response for
//! an id this endpoint is not waiting on, which can only come from broken
//! bookkeeping.

use std::rc::Rc;

use pe_protocol::{Envelope, MessageType, Rejection, Reply, classify};
use pe_runtime::MessageEvent;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::Transport;

impl Endpoint {
	/// Classifies and routes one inbound message.
	pub fn dispatch(&self, event: &MessageEvent) -> Result<()> {
		if !self.accepts_origin(&event.origin) {
			tracing::warn!(origin = %event.origin, "dropping message from unexpected origin");
			return Ok(());
		}

		let envelope = match classify(&event.data) {
			Ok(envelope) => envelope,
			Err(Rejection::NotAnObject) => {
				tracing::debug!(origin = %event.origin, "ignoring non-object message");
				return Ok(());
			}
			Err(rejection) => {
				tracing::warn!(origin = %event.origin, "dropping message: {rejection}");
				return Ok(());
			}
		};

		tracing::debug!(
			kind = %envelope.head.kind,
			id = envelope.head.req_id,
			key = ?envelope.head.key,
			"dispatching message"
		);

		match envelope.head.kind {
			MessageType::Request => {
				let id = envelope.head.req_id;
				self.route(event, envelope, Some(id));
				Ok(())
			}
			MessageType::Init => {
				self.route(event, envelope, None);
				Ok(())
			}
			MessageType::Response => {
				let id = envelope.head.req_id;
				let pending = self.take_pending(id).ok_or(Error::UnknownRequest(id))?;
				pending.complete(Reply::from_body(envelope.body));
				Ok(())
			}
		}
	}

	/// Hands a request or init message to its handler.
	fn route(&self, event: &MessageEvent, envelope: Envelope, response_id: Option<u64>) {
		let id = envelope.head.req_id;
		let Some(key) = envelope.head.key.as_deref().filter(|k| !k.is_empty()) else {
			tracing::warn!(id, "dropping {} without a key", envelope.head.kind);
			return;
		};
		let Some(handler) = self.handler(key) else {
			tracing::warn!(id, key, "no handler registered, dropping message");
			return;
		};
		let Some(source) = event.source.as_ref() else {
			tracing::warn!(id, key, "message has no source window, dropping");
			return;
		};

		let transport = Transport::inbound(self, Rc::clone(source), response_id);
		handler(envelope, transport);
	}
}
