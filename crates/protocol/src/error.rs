//! Errors raised by protocol-level validation.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Misuse of the protocol detected before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// No protocol version was supplied.
	#[error("protocol version is required")]
	MissingVersion,

	/// The version is not one of [`ProtocolVersion::KNOWN`](crate::ProtocolVersion::KNOWN).
	#[error("unsupported protocol version: {0:?}")]
	UnsupportedVersion(String),

	/// Request keys must contain at least one non-whitespace character.
	#[error("key must be a non-blank string")]
	BlankKey,
}
