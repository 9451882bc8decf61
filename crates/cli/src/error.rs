use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("timeout after {ms}ms waiting for: {condition}")]
	Timeout { ms: u64, condition: String },

	#[error("{command} failed: {source}")]
	Command {
		command: &'static str,
		#[source]
		source: Box<CliError>,
	},

	#[error(transparent)]
	Endpoint(#[from] pe::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// Tags the error with the subcommand it came from.
	pub fn in_command(self, command: &'static str) -> Self {
		match self {
			already @ CliError::Command { .. } => already,
			other => CliError::Command {
				command,
				source: Box::new(other),
			},
		}
	}

	/// Subcommand name for the failure envelope.
	pub fn command(&self) -> &'static str {
		match self {
			CliError::Command { command, .. } => command,
			_ => "unknown",
		}
	}

	fn root(&self) -> &CliError {
		match self {
			CliError::Command { source, .. } => source.root(),
			other => other,
		}
	}

	pub fn to_command_error(&self) -> CommandError {
		let root = self.root();
		let code = match root {
			CliError::InvalidInput(_) | CliError::Json(_) => ErrorCode::InvalidInput,
			CliError::Timeout { .. } => ErrorCode::Timeout,
			CliError::Endpoint(e) if e.is_version_error() || e.is_blank_key() => ErrorCode::ProtocolError,
			CliError::Endpoint(_) => ErrorCode::EndpointError,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Anyhow(_) | CliError::Command { .. } => ErrorCode::InternalError,
		};

		CommandError {
			code,
			message: root.to_string(),
			details: None,
		}
	}
}
