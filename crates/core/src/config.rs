//! Endpoint configuration.

use pe_protocol::ProtocolVersion;
use serde::{Deserialize, Serialize};

/// Settings for one [`Endpoint`](crate::Endpoint).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointConfig {
	/// Version used by [`Endpoint::ensure_default`](crate::Endpoint::ensure_default).
	pub version: ProtocolVersion,
	/// Origins accepted in addition to `"null"` and the page's own origin.
	pub accepted_origins: Vec<String>,
}

impl EndpointConfig {
	pub fn with_version(mut self, version: ProtocolVersion) -> Self {
		self.version = version;
		self
	}

	pub fn accept_origin(mut self, origin: impl Into<String>) -> Self {
		self.accepted_origins.push(origin.into());
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_to_v1_without_extra_origins() {
		let config = EndpointConfig::default();
		assert_eq!(config.version, ProtocolVersion::V1);
		assert!(config.accepted_origins.is_empty());
	}

	#[test]
	fn deserializes_partial_json() {
		let config: EndpointConfig =
			serde_json::from_str(r#"{"acceptedOrigins": ["https://plugins.example.com"]}"#).unwrap();
		assert_eq!(config.version, ProtocolVersion::V1);
		assert_eq!(config.accepted_origins, vec!["https://plugins.example.com"]);

		let err = serde_json::from_str::<EndpointConfig>(r#"{"version": "v9"}"#);
		assert!(err.is_err());
	}
}
