//! The `{head, body}` envelope and inbound validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Kind of envelope, carried in `head.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
	Request,
	Response,
	/// Handshake announcing a plugin frame's identity. Never answered.
	Init,
}

impl MessageType {
	pub fn as_str(self) -> &'static str {
		match self {
			MessageType::Request => "request",
			MessageType::Response => "response",
			MessageType::Init => "init",
		}
	}

	fn parse(s: &str) -> Option<Self> {
		match s {
			"request" => Some(MessageType::Request),
			"response" => Some(MessageType::Response),
			"init" => Some(MessageType::Init),
			_ => None,
		}
	}
}

impl fmt::Display for MessageType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Sender identity established by the init handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub plugin_id: Option<String>,
}

impl Identity {
	/// Reads `uid` and `pluginId` from an init body. Non-string values are ignored.
	pub fn from_body(body: &Value) -> Self {
		let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);
		Self {
			uid: field("uid"),
			plugin_id: field("pluginId"),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.uid.is_none() && self.plugin_id.is_none()
	}
}

/// Envelope header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Head {
	#[serde(rename = "type")]
	pub kind: MessageType,
	/// Sender-local correlation id. Only unique per sender.
	pub req_id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub plugin_id: Option<String>,
}

/// A complete wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	pub head: Head,
	#[serde(default)]
	pub body: Value,
}

impl Envelope {
	fn new(kind: MessageType, req_id: u64, key: Option<String>, body: Value) -> Self {
		Self {
			head: Head {
				kind,
				req_id,
				key,
				uid: None,
				plugin_id: None,
			},
			body,
		}
	}

	/// Request for an already-qualified key.
	pub fn request(req_id: u64, key: impl Into<String>, body: Value) -> Self {
		Self::new(MessageType::Request, req_id, Some(key.into()), body)
	}

	/// Response to the sender's request `req_id`.
	pub fn response(req_id: u64, body: Value) -> Self {
		Self::new(MessageType::Response, req_id, None, body)
	}

	/// Handshake for an already-qualified init key.
	pub fn init(req_id: u64, key: impl Into<String>, body: Value) -> Self {
		Self::new(MessageType::Init, req_id, Some(key.into()), body)
	}

	/// Stamps `uid`/`pluginId` into the head.
	pub fn with_identity(mut self, identity: &Identity) -> Self {
		self.head.uid = identity.uid.clone();
		self.head.plugin_id = identity.plugin_id.clone();
		self
	}

	/// The envelope as a JSON value ready for `postMessage`.
	pub fn to_value(&self) -> Value {
		// Every field is a string, integer or already a Value.
		serde_json::to_value(self).unwrap_or(Value::Null)
	}
}

/// Conventional response body: `{data, errors}`.
///
/// A present, non-null `errors` marks the response as failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub errors: Option<Value>,
}

impl Reply {
	pub fn ok(data: impl Into<Value>) -> Self {
		Self {
			data: Some(data.into()),
			errors: None,
		}
	}

	pub fn err(errors: impl Into<Value>) -> Self {
		Self {
			data: None,
			errors: Some(errors.into()),
		}
	}

	/// Interprets a response body. Bodies that are not objects count as plain data.
	pub fn from_body(body: Value) -> Self {
		match body {
			Value::Object(mut map) => Self {
				data: map.remove("data").filter(|v| !v.is_null()),
				errors: map.remove("errors").filter(|v| !v.is_null()),
			},
			Value::Null => Self::default(),
			other => Self::ok(other),
		}
	}

	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).unwrap_or(Value::Null)
	}
}

/// Why an inbound value is not a usable envelope.
///
/// Checks run in this order and the first failure wins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
	#[error("message data is not an object")]
	NotAnObject,
	#[error("message head is missing or not an object")]
	MissingHead,
	#[error("message head.type is missing or not a string")]
	MissingType,
	#[error("message head.reqId is missing or not a number")]
	MissingRequestId,
	#[error("message head.reqId is not a non-negative integer: {0}")]
	InvalidRequestId(serde_json::Number),
	#[error("unknown message type {kind:?} (reqId={req_id})")]
	UnknownType { kind: String, req_id: u64 },
}

/// Validates untrusted inbound data and builds an [`Envelope`].
///
/// Tolerates unrelated traffic on the channel: nothing here panics, every
/// malformed shape maps to a [`Rejection`].
pub fn classify(data: &Value) -> std::result::Result<Envelope, Rejection> {
	let obj = data.as_object().ok_or(Rejection::NotAnObject)?;
	let head = obj
		.get("head")
		.and_then(Value::as_object)
		.ok_or(Rejection::MissingHead)?;
	let kind = head
		.get("type")
		.and_then(Value::as_str)
		.ok_or(Rejection::MissingType)?;
	let req_id = match head.get("reqId") {
		Some(Value::Number(n)) => n
			.as_u64()
			.or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
			.ok_or_else(|| Rejection::InvalidRequestId(n.clone()))?,
		_ => return Err(Rejection::MissingRequestId),
	};
	let kind = MessageType::parse(kind).ok_or_else(|| Rejection::UnknownType {
		kind: kind.to_string(),
		req_id,
	})?;

	let text = |name: &str| head.get(name).and_then(Value::as_str).map(str::to_string);

	Ok(Envelope {
		head: Head {
			kind,
			req_id,
			key: text("key"),
			uid: text("uid"),
			plugin_id: text("pluginId"),
		},
		body: obj.get("body").cloned().unwrap_or(Value::Null),
	})
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_serializes_with_camel_case_head() {
		let env = Envelope::request(7, "go.cd.analytics.v1.foo", json!({"a": 1}));
		let value = env.to_value();
		assert_eq!(
			value,
			json!({
				"head": {"type": "request", "reqId": 7, "key": "go.cd.analytics.v1.foo"},
				"body": {"a": 1}
			})
		);
	}

	#[test]
	fn response_omits_key_and_identity() {
		let value = Envelope::response(3, json!("ok")).to_value();
		assert_eq!(value, json!({"head": {"type": "response", "reqId": 3}, "body": "ok"}));
	}

	#[test]
	fn identity_is_stamped_into_head() {
		let identity = Identity {
			uid: Some("u-1".into()),
			plugin_id: Some("com.example.analytics".into()),
		};
		let value = Envelope::init(0, "go.cd.analytics.v1.init", Value::Null)
			.with_identity(&identity)
			.to_value();
		assert_eq!(value["head"]["uid"], "u-1");
		assert_eq!(value["head"]["pluginId"], "com.example.analytics");
		assert_eq!(value["head"]["type"], "init");
	}

	#[test]
	fn classify_rejects_in_dispatch_order() {
		assert_eq!(classify(&json!("hello")), Err(Rejection::NotAnObject));
		assert_eq!(classify(&json!(null)), Err(Rejection::NotAnObject));
		assert_eq!(classify(&json!({"body": 1})), Err(Rejection::MissingHead));
		assert_eq!(classify(&json!({"head": "x"})), Err(Rejection::MissingHead));
		assert_eq!(
			classify(&json!({"head": {"reqId": 1}})),
			Err(Rejection::MissingType)
		);
		assert_eq!(
			classify(&json!({"head": {"type": 5, "reqId": 1}})),
			Err(Rejection::MissingType)
		);
		assert_eq!(
			classify(&json!({"head": {"type": "request"}})),
			Err(Rejection::MissingRequestId)
		);
		assert_eq!(
			classify(&json!({"head": {"type": "request", "reqId": "1"}})),
			Err(Rejection::MissingRequestId)
		);
		assert!(matches!(
			classify(&json!({"head": {"type": "request", "reqId": -2}})),
			Err(Rejection::InvalidRequestId(_))
		));
		assert_eq!(
			classify(&json!({"head": {"type": "ping", "reqId": 4}})),
			Err(Rejection::UnknownType {
				kind: "ping".into(),
				req_id: 4
			})
		);
	}

	#[test]
	fn classify_accepts_integral_floats() {
		let env = classify(&json!({"head": {"type": "response", "reqId": 2.0}, "body": 1})).unwrap();
		assert_eq!(env.head.req_id, 2);
		assert_eq!(env.head.kind, MessageType::Response);
	}

	#[test]
	fn classify_ignores_non_string_optional_fields() {
		let env = classify(&json!({
			"head": {"type": "request", "reqId": 1, "key": 42, "uid": "u"}
		}))
		.unwrap();
		assert_eq!(env.head.key, None);
		assert_eq!(env.head.uid.as_deref(), Some("u"));
		assert_eq!(env.body, Value::Null);
	}

	#[test]
	fn reply_splits_data_and_errors() {
		let ok = Reply::from_body(json!({"data": [1, 2]}));
		assert_eq!(ok.data, Some(json!([1, 2])));
		assert_eq!(ok.errors, None);

		let failed = Reply::from_body(json!({"data": null, "errors": ["boom"]}));
		assert_eq!(failed.data, None);
		assert_eq!(failed.errors, Some(json!(["boom"])));

		assert_eq!(Reply::from_body(json!(12)), Reply::ok(12));
		assert_eq!(Reply::from_body(Value::Null), Reply::default());
	}

	#[test]
	fn rejection_descriptions_are_readable() {
		assert_eq!(
			Rejection::MissingHead.to_string(),
			"message head is missing or not an object"
		);
		let unknown = Rejection::UnknownType {
			kind: "ping".into(),
			req_id: 9,
		};
		assert_eq!(unknown.to_string(), r#"unknown message type "ping" (reqId=9)"#);
	}
}
