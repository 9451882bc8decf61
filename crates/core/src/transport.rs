//! One logical exchange with another window.

use std::cell::Cell;
use std::rc::Rc;

use pe_protocol::{Envelope, validate_key};
use pe_runtime::Window;
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::pending::PendingRequest;

/// Target origin used for every post; origins are only checked on receipt.
pub(crate) const ANY_ORIGIN: &str = "*";

/// Bound to a target window and, for inbound requests, to the id to answer.
///
/// Clones of an inbound transport share its "already responded" state.
#[derive(Clone)]
pub struct Transport {
	endpoint: Endpoint,
	target: Rc<dyn Window>,
	response_id: Option<u64>,
	responded: Rc<Cell<bool>>,
}

impl Transport {
	/// Outbound transport for sending requests to `target`.
	pub fn new(endpoint: &Endpoint, target: Rc<dyn Window>) -> Self {
		Self {
			endpoint: endpoint.clone(),
			target,
			response_id: None,
			responded: Rc::new(Cell::new(false)),
		}
	}

	pub(crate) fn inbound(endpoint: &Endpoint, target: Rc<dyn Window>, response_id: Option<u64>) -> Self {
		Self {
			response_id,
			..Self::new(endpoint, target)
		}
	}

	pub fn endpoint(&self) -> &Endpoint {
		&self.endpoint
	}

	pub fn target(&self) -> &Rc<dyn Window> {
		&self.target
	}

	/// Id of the request this transport answers, if any.
	pub fn response_id(&self) -> Option<u64> {
		self.response_id
	}

	pub fn has_responded(&self) -> bool {
		self.responded.get()
	}

	/// Sends a request for `key` (namespaced under the ensured version).
	///
	/// The key is checked immediately; the post itself is deferred until the
	/// current turn ends so callbacks can be attached to the returned
	/// [`PendingRequest`] first.
	pub fn request(&self, key: &str, data: Value) -> Result<PendingRequest> {
		validate_key(key)?;
		let version = self.endpoint.version().ok_or(Error::NotEnsured)?;
		let qualified = version.qualify(key);

		let pending = self.endpoint.track_request();
		let id = pending.req_id();
		let envelope = Envelope::request(id, qualified, data).with_identity(&self.endpoint.identity());

		tracing::debug!(id, key = ?envelope.head.key, "queueing request");

		let target = Rc::clone(&self.target);
		self.endpoint.page().defer(Box::new(move || {
			if let Err(e) = target.post_message(&envelope.to_value(), ANY_ORIGIN) {
				tracing::error!(id, "failed to post request: {e}");
			}
		}));

		Ok(pending)
	}

	/// Answers the bound request. Only the first call sends anything.
	pub fn respond(&self, data: Value) {
		let Some(id) = self.response_id else {
			tracing::error!("respond() called on a transport with no request to answer");
			return;
		};
		if self.responded.replace(true) {
			tracing::error!(id, "already responded to request");
			return;
		}

		tracing::debug!(id, "sending response");
		if let Err(e) = self
			.target
			.post_message(&Envelope::response(id, data).to_value(), ANY_ORIGIN)
		{
			tracing::error!(id, "failed to post response: {e}");
		}
	}
}

impl std::fmt::Debug for Transport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Transport")
			.field("response_id", &self.response_id)
			.field("responded", &self.responded.get())
			.finish()
	}
}
