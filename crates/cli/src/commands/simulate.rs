//! `pe simulate`: a host page and a plugin frame in one process.
//!
//! Both frames are driven on a [`LocalSet`]. The host registers a
//! `fetch-analytics` handler, sends the handshake, and the plugin fires
//! `--requests` requests at it. The handler answers the first ones with data,
//! the next `--failures` with errors and ignores the last `--unanswered`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use pe::{Endpoint, EndpointConfig, Envelope, Frame, Reply, Transport};
use serde_json::{Value, json};
use tokio::task::LocalSet;

use crate::cli::SimulateArgs;
use crate::error::{CliError, Result};
use crate::output::{Answer, DiagnosticLevel, HandledRequest, OutputFormat, ResultBuilder, SimulateData, print_result};

pub const HOST_ORIGIN: &str = "https://ci.example.com";
pub const PLUGIN_ORIGIN: &str = "https://plugins.example.com";
const FETCH_KEY: &str = "fetch-analytics";
const METRICS: &[&str] = &["builds", "failures", "duration", "queue"];

pub async fn execute(args: &SimulateArgs, format: OutputFormat) -> Result<()> {
	let data = LocalSet::new().run_until(run(args)).await?;

	let mut builder = ResultBuilder::new("simulate");
	if data.pending > 0 {
		builder = builder.diagnostic(
			DiagnosticLevel::Warning,
			format!("{} request(s) never answered, released by reset", data.pending),
		);
	}
	print_result(&builder.data(data).build(), format);
	Ok(())
}

/// Runs the exchange. Must be polled inside a [`LocalSet`].
pub async fn run(args: &SimulateArgs) -> Result<SimulateData> {
	let split = args
		.requests
		.checked_sub(args.unanswered)
		.and_then(|n| n.checked_sub(args.failures))
		.map(|succeeding| (succeeding, args.requests - args.unanswered))
		.ok_or_else(|| {
			CliError::InvalidInput(format!(
				"--failures ({}) plus --unanswered ({}) exceeds --requests ({})",
				args.failures, args.unanswered, args.requests
			))
		})?;

	let host_frame = Frame::new(HOST_ORIGIN);
	let plugin_frame = if args.sandboxed {
		Frame::sandboxed(PLUGIN_ORIGIN)
	} else {
		Frame::new(PLUGIN_ORIGIN)
	};

	let host = Endpoint::with_config(
		Rc::new(host_frame.clone()),
		EndpointConfig::default().accept_origin(PLUGIN_ORIGIN),
	);
	let plugin = Endpoint::with_config(
		Rc::new(plugin_frame.clone()),
		EndpointConfig::default().accept_origin(HOST_ORIGIN),
	);
	host.ensure(&args.protocol)?;
	plugin.ensure(&args.protocol)?;

	let handled = Rc::new(RefCell::new(Vec::new()));
	let version = host.version().ok_or(pe::Error::NotEnsured)?;
	host.on(version.qualify(FETCH_KEY), answering_handler(Rc::clone(&handled), split));

	let initial = Rc::new(RefCell::new(None));
	let slot = Rc::clone(&initial);
	plugin.on_init(move |data: Value, _: Transport| *slot.borrow_mut() = Some(data))?;

	for frame in [&host_frame, &plugin_frame] {
		let frame = frame.clone();
		tokio::task::spawn_local(async move { frame.run().await });
	}

	let plugin_window = plugin_frame.window_for(&host_frame);
	host.init(
		&plugin_window,
		json!({
			"uid": args.uid,
			"pluginId": args.plugin_id,
			"initialData": {"view": "dashboard", "metrics": METRICS},
		}),
	)?;
	wait_for(args.wait_ms, "init handshake", || initial.borrow().is_some()).await?;
	tracing::info!(identity = ?plugin.identity(), "plugin initialized");

	let host_window = host_frame.window_for(&plugin_frame);
	let mut responses = Vec::new();
	for index in 0..args.requests {
		let metric = METRICS[index as usize % METRICS.len()];
		let pending = plugin.request(Rc::clone(&host_window), FETCH_KEY, json!({"metric": metric, "index": index}))?;
		responses.push(pending.response());
	}

	let deadline = tokio::time::Instant::now() + Duration::from_millis(args.wait_ms);
	let (mut resolved, mut failed) = (0, 0);
	for response in responses {
		match tokio::time::timeout_at(deadline, response).await {
			Ok(Ok(_)) => resolved += 1,
			Ok(Err(pe::Error::Failed { .. })) => failed += 1,
			Ok(Err(e)) => return Err(e.into()),
			Err(_) => {}
		}
	}

	let pending = plugin.pending_count();
	plugin.reset();
	host.reset();

	let initial_data = initial.borrow_mut().take().unwrap_or(Value::Null);
	let handled = handled.borrow().clone();
	Ok(SimulateData {
		plugin_id: args.plugin_id.clone(),
		uid: args.uid.clone(),
		initial_data,
		sent: args.requests,
		resolved,
		failed,
		pending,
		pending_after_reset: plugin.pending_count(),
		handled,
	})
}

/// Host handler: data for the first `succeeding` requests, errors up to
/// `answered`, silence after that.
fn answering_handler(
	log: Rc<RefCell<Vec<HandledRequest>>>,
	(succeeding, answered): (u32, u32),
) -> impl Fn(Envelope, Transport) + 'static {
	move |message: Envelope, transport: Transport| {
		let seen = log.borrow().len() as u32;
		let answer = if seen < succeeding {
			Answer::Data
		} else if seen < answered {
			Answer::Errors
		} else {
			Answer::Ignored
		};

		match answer {
			Answer::Data => transport.respond(
				Reply::ok(json!({"metric": message.body["metric"], "value": (seen + 1) * 10})).to_value(),
			),
			Answer::Errors => transport.respond(Reply::err(json!([format!("metric {seen} unavailable")])).to_value()),
			Answer::Ignored => tracing::info!(id = message.head.req_id, "leaving request unanswered"),
		}

		log.borrow_mut().push(HandledRequest {
			req_id: message.head.req_id,
			key: message.head.key.unwrap_or_default(),
			uid: message.head.uid,
			plugin_id: message.head.plugin_id,
			answer,
		});
	}
}

async fn wait_for(ms: u64, condition: &str, ready: impl Fn() -> bool) -> Result<()> {
	let poll = async {
		while !ready() {
			tokio::task::yield_now().await;
		}
	};
	tokio::time::timeout(Duration::from_millis(ms), poll)
		.await
		.map_err(|_| CliError::Timeout {
			ms,
			condition: condition.to_string(),
		})
}
