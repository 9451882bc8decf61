//! `pe inspect`: run envelopes through the dispatcher's validation.

use std::io::Read;

use anyhow::Context;
use pe::{MessageType, ProtocolVersion};
use pe_protocol::{NAMESPACE, classify};
use serde_json::Value;

use crate::cli::InspectArgs;
use crate::error::Result;
use crate::output::{DiagnosticLevel, InspectData, InspectedMessage, OutputFormat, ResultBuilder, print_result};

pub fn execute(args: &InspectArgs, format: OutputFormat) -> Result<()> {
	let raw = read_input(args)?;
	let value: Value = serde_json::from_str(&raw)?;
	let data = inspect(&value);

	let mut builder = ResultBuilder::new("inspect");
	let dropped = data.total - data.accepted;
	if dropped > 0 {
		builder = builder.diagnostic(
			DiagnosticLevel::Warning,
			format!("{dropped} message(s) would be dropped"),
		);
	}
	print_result(&builder.data(data).build(), format);
	Ok(())
}

fn read_input(args: &InspectArgs) -> Result<String> {
	if let Some(input) = &args.input {
		return Ok(input.clone());
	}
	if let Some(path) = &args.file {
		let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
		return Ok(raw);
	}
	let mut raw = String::new();
	std::io::stdin().read_to_string(&mut raw)?;
	Ok(raw)
}

/// Classifies one envelope, or each element of an array of envelopes.
pub fn inspect(value: &Value) -> InspectData {
	let items: Vec<&Value> = match value {
		Value::Array(items) => items.iter().collect(),
		other => vec![other],
	};

	let messages: Vec<InspectedMessage> = items
		.into_iter()
		.enumerate()
		.map(|(index, data)| inspect_one(index, data))
		.collect();

	InspectData {
		total: messages.len(),
		accepted: messages.iter().filter(|m| m.accepted).count(),
		messages,
	}
}

fn inspect_one(index: usize, data: &Value) -> InspectedMessage {
	let envelope = match classify(data) {
		Ok(envelope) => envelope,
		Err(rejection) => {
			return InspectedMessage {
				index,
				accepted: false,
				kind: None,
				req_id: None,
				key: None,
				version: None,
				reason: Some(rejection.to_string()),
			};
		}
	};

	let head = envelope.head;
	let keyed = head.key.as_deref().is_some_and(|k| !k.is_empty());
	let reason = match head.kind {
		MessageType::Request | MessageType::Init if !keyed => Some(format!("{} without a key", head.kind)),
		_ => None,
	};

	InspectedMessage {
		index,
		accepted: reason.is_none(),
		kind: Some(head.kind.to_string()),
		req_id: Some(head.req_id),
		version: head.key.as_deref().and_then(key_version),
		key: head.key,
		reason,
	}
}

/// Version segment of a namespaced key such as `go.cd.analytics.v1.fetch`.
fn key_version(key: &str) -> Option<String> {
	let rest = key.strip_prefix(NAMESPACE)?.strip_prefix('.')?;
	let (version, _) = rest.split_once('.')?;
	version.parse::<ProtocolVersion>().ok().map(|v| v.to_string())
}
