use serde_json::json;

use super::*;

#[test]
fn result_builder_success() {
	let result: CommandResult<SimulateData> = ResultBuilder::new("simulate")
		.data(SimulateData {
			plugin_id: "com.example.analytics".into(),
			sent: 2,
			resolved: 2,
			..Default::default()
		})
		.build();

	assert!(result.ok);
	assert_eq!(result.command, "simulate");
	assert_eq!(result.schema_version, Some(SCHEMA_VERSION));
	assert!(result.error.is_none());
}

#[test]
fn result_builder_error() {
	let result: CommandResult<SimulateData> = ResultBuilder::new("simulate")
		.error(ErrorCode::ProtocolError, "unsupported protocol version \"v9\"")
		.build();

	assert!(!result.ok);
	assert!(result.data.is_none());
	assert_eq!(result.error.as_ref().unwrap().code, ErrorCode::ProtocolError);
}

#[test]
fn error_code_display() {
	assert_eq!(ErrorCode::InvalidInput.to_string(), "INVALID_INPUT");
	assert_eq!(ErrorCode::EndpointError.to_string(), "ENDPOINT_ERROR");
}

#[test]
fn output_format_parse() {
	assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
	assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
	assert!("yaml".parse::<OutputFormat>().is_err());
}

#[test]
fn serialize_uses_camel_case() {
	let result: CommandResult<InspectData> = ResultBuilder::new("inspect")
		.data(InspectData {
			total: 1,
			accepted: 1,
			messages: vec![InspectedMessage {
				index: 0,
				accepted: true,
				kind: Some("request".into()),
				req_id: Some(4),
				key: Some("go.cd.analytics.v1.fetch".into()),
				version: Some("v1".into()),
				reason: None,
			}],
		})
		.diagnostic(DiagnosticLevel::Info, "all good")
		.build();

	let value = serde_json::to_value(&result).unwrap();
	assert_eq!(value["schemaVersion"], 1);
	assert_eq!(value["data"]["messages"][0]["type"], "request");
	assert_eq!(value["data"]["messages"][0]["reqId"], 4);
	assert!(value["data"]["messages"][0].get("reason").is_none());
	assert_eq!(value["diagnostics"][0], json!({"level": "info", "message": "all good"}));
}
