//! Error types for the endpoint.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for endpoint operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned to the caller.
///
/// Only caller misuse and internal bookkeeping failures end up here. Malformed
/// messages from other windows are logged and dropped instead.
#[derive(Debug, Error)]
pub enum Error {
	/// Blank key or missing/unsupported version.
	#[error(transparent)]
	Protocol(#[from] pe_protocol::Error),

	/// Posting to a window failed.
	#[error(transparent)]
	Runtime(#[from] pe_runtime::Error),

	/// A namespaced operation was used before [`ensure`](crate::Endpoint::ensure).
	#[error("endpoint has no protocol version: call ensure() first")]
	NotEnsured,

	/// A response arrived for an id this endpoint never issued or already resolved.
	#[error("no request with id {0}")]
	UnknownRequest(u64),

	/// The peer answered with errors.
	#[error("request {id} failed: {errors}")]
	Failed { id: u64, errors: Value },

	/// The pending request was dropped by [`reset`](crate::Endpoint::reset).
	#[error("request {0} was abandoned before a response arrived")]
	Abandoned(u64),
}

impl Error {
	/// Returns true for a blank request key.
	pub fn is_blank_key(&self) -> bool {
		matches!(self, Error::Protocol(pe_protocol::Error::BlankKey))
	}

	/// Returns true for a missing or unsupported protocol version.
	pub fn is_version_error(&self) -> bool {
		matches!(
			self,
			Error::Protocol(pe_protocol::Error::MissingVersion | pe_protocol::Error::UnsupportedVersion(_))
		)
	}
}
