//! Protocol versions and key namespacing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix shared by every namespaced key.
pub const NAMESPACE: &str = "go.cd.analytics";

/// Unqualified key of the handshake message.
pub const INIT_KEY: &str = "init";

/// Known protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
	#[default]
	V1,
}

impl ProtocolVersion {
	/// Every version this build understands.
	pub const KNOWN: &'static [ProtocolVersion] = &[ProtocolVersion::V1];

	pub fn as_str(self) -> &'static str {
		match self {
			ProtocolVersion::V1 => "v1",
		}
	}

	/// Returns `go.cd.analytics.<version>.<key>`.
	///
	/// The key is not validated here; see [`validate_key`].
	pub fn qualify(self, key: &str) -> String {
		format!("{NAMESPACE}.{}.{key}", self.as_str())
	}
}

impl fmt::Display for ProtocolVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ProtocolVersion {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		if s.is_empty() {
			return Err(Error::MissingVersion);
		}
		Self::KNOWN
			.iter()
			.copied()
			.find(|v| v.as_str() == s)
			.ok_or_else(|| Error::UnsupportedVersion(s.to_string()))
	}
}

/// Rejects empty and whitespace-only keys.
pub fn validate_key(key: &str) -> Result<()> {
	if key.trim().is_empty() {
		return Err(Error::BlankKey);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_known_versions() {
		assert_eq!("v1".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V1));
		for v in ProtocolVersion::KNOWN {
			assert_eq!(v.as_str().parse::<ProtocolVersion>(), Ok(*v));
		}
	}

	#[test]
	fn rejects_missing_and_unknown_versions() {
		assert_eq!("".parse::<ProtocolVersion>(), Err(Error::MissingVersion));
		assert_eq!(
			"v2".parse::<ProtocolVersion>(),
			Err(Error::UnsupportedVersion("v2".into()))
		);
		assert_eq!(
			"V1".parse::<ProtocolVersion>(),
			Err(Error::UnsupportedVersion("V1".into()))
		);
	}

	#[test]
	fn qualifies_keys_under_namespace() {
		assert_eq!(
			ProtocolVersion::V1.qualify("fetch-analytics"),
			"go.cd.analytics.v1.fetch-analytics"
		);
		assert_eq!(ProtocolVersion::V1.qualify(INIT_KEY), "go.cd.analytics.v1.init");
	}

	#[test]
	fn blank_keys_are_rejected() {
		assert_eq!(validate_key(""), Err(Error::BlankKey));
		assert_eq!(validate_key("  \t\n"), Err(Error::BlankKey));
		assert_eq!(validate_key(" x "), Ok(()));
	}
}
