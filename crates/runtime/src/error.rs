//! Error types for the endpoint runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while posting or delivering messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// The target window no longer exists.
	#[error("Window closed: cannot post to {0}")]
	WindowClosed(String),

	/// The environment refused the message (e.g. it could not be cloned).
	#[error("postMessage failed: {0}")]
	Post(String),

	/// A message listener failed; the event loop reports it like an uncaught exception.
	#[error("Uncaught error in message listener: {0}")]
	Listener(String),
}
