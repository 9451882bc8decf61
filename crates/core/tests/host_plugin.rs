//! Host page and sandboxed plugin frame talking through in-process frames.

use std::cell::RefCell;
use std::rc::Rc;

use pe::{Endpoint, Envelope, Frame, Reply, Transport, Window, run_all_until_idle};
use serde_json::{Value, json};

const HOST_ORIGIN: &str = "https://ci.example.com";
const FETCH: &str = "go.cd.analytics.v1.fetch-analytics";

struct Pair {
	host_frame: Frame,
	plugin_frame: Frame,
	host: Endpoint,
	plugin: Endpoint,
	/// Host's handle on the plugin frame (`iframe.contentWindow`).
	plugin_window: Rc<dyn Window>,
	/// Plugin's handle on the host (`window.parent`).
	host_window: Rc<dyn Window>,
}

fn pair() -> Pair {
	let host_frame = Frame::new(HOST_ORIGIN);
	let plugin_frame = Frame::sandboxed(HOST_ORIGIN);
	let host = Endpoint::new(Rc::new(host_frame.clone()));
	let plugin = Endpoint::new(Rc::new(plugin_frame.clone()));
	host.ensure("v1").unwrap();
	plugin.ensure("v1").unwrap();

	Pair {
		plugin_window: plugin_frame.window_for(&host_frame),
		host_window: host_frame.window_for(&plugin_frame),
		host_frame,
		plugin_frame,
		host,
		plugin,
	}
}

impl Pair {
	fn pump(&self) {
		run_all_until_idle(&[&self.host_frame, &self.plugin_frame]).unwrap();
	}
}

#[test]
fn handshake_then_request_round_trip() {
	let p = pair();

	let seen_by_host = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&seen_by_host);
	p.host.on(FETCH, move |message: Envelope, transport: Transport| {
		sink.borrow_mut().push(message.head.clone());
		let metric = message.body["metric"].as_str().unwrap_or_default().to_string();
		transport.respond(Reply::ok(json!({"metric": metric, "count": 12})).to_value());
	});

	let initial = Rc::new(RefCell::new(Value::Null));
	let slot = Rc::clone(&initial);
	p.plugin
		.on_init(move |data: Value, _| *slot.borrow_mut() = data)
		.unwrap();

	p.host
		.init(
			&p.plugin_window,
			json!({"uid": "u-1", "pluginId": "com.example.analytics", "initialData": {"view": "pipelines"}}),
		)
		.unwrap();
	p.pump();

	assert_eq!(*initial.borrow(), json!({"view": "pipelines"}));
	assert_eq!(p.plugin.identity().uid.as_deref(), Some("u-1"));

	let result = Rc::new(RefCell::new(None));
	let finished = Rc::new(RefCell::new(false));
	let (r, f) = (Rc::clone(&result), Rc::clone(&finished));
	p.plugin
		.request(Rc::clone(&p.host_window), "fetch-analytics", json!({"metric": "builds"}))
		.unwrap()
		.done(move |data| *r.borrow_mut() = Some(data))
		.fail(|errors| panic!("unexpected failure: {errors}"))
		.always(move || *f.borrow_mut() = true);

	p.pump();

	assert_eq!(*result.borrow(), Some(json!({"metric": "builds", "count": 12})));
	assert!(*finished.borrow());
	assert_eq!(p.plugin.pending_count(), 0);

	let heads = seen_by_host.borrow();
	assert_eq!(heads.len(), 1);
	assert_eq!(heads[0].uid.as_deref(), Some("u-1"));
	assert_eq!(heads[0].plugin_id.as_deref(), Some("com.example.analytics"));
}

#[test]
fn both_sides_can_request() {
	let p = pair();
	p.plugin.on("go.cd.analytics.v1.theme", |_: Envelope, transport: Transport| {
		transport.respond(Reply::ok("dark").to_value());
	});

	let theme = Rc::new(RefCell::new(None));
	let t = Rc::clone(&theme);
	p.host
		.request(Rc::clone(&p.plugin_window), "theme", Value::Null)
		.unwrap()
		.done(move |data| *t.borrow_mut() = Some(data));
	p.pump();

	assert_eq!(*theme.borrow(), Some(json!("dark")));
}

#[test]
fn handler_errors_reach_fail() {
	let p = pair();
	p.host.on(FETCH, |_: Envelope, transport: Transport| {
		transport.respond(Reply::err(json!(["plugin not authorized"])).to_value());
	});

	let errors = Rc::new(RefCell::new(None));
	let e = Rc::clone(&errors);
	p.plugin
		.request(Rc::clone(&p.host_window), "fetch-analytics", Value::Null)
		.unwrap()
		.fail(move |errs| *e.borrow_mut() = Some(errs));
	p.pump();

	assert_eq!(*errors.borrow(), Some(json!(["plugin not authorized"])));
}

#[test]
fn unanswered_requests_leak_until_reset() {
	let p = pair();
	p.host.on(FETCH, |_: Envelope, _: Transport| {});

	for _ in 0..3 {
		p.plugin
			.request(Rc::clone(&p.host_window), "fetch-analytics", Value::Null)
			.unwrap();
	}
	p.pump();
	assert_eq!(p.plugin.pending_count(), 3);

	p.plugin.reset();
	assert_eq!(p.plugin.pending_count(), 0);
}

#[test]
fn duplicate_response_surfaces_as_uncaught_error() {
	let p = pair();
	p.host.on(FETCH, |message: Envelope, transport: Transport| {
		transport.respond(Reply::ok(1).to_value());
		// A misbehaving host replaying the response by hand.
		let replay = Envelope::response(message.head.req_id, Reply::ok(2).to_value());
		transport
			.target()
			.post_message(&replay.to_value(), "*")
			.unwrap();
	});

	let hits = Rc::new(RefCell::new(0));
	let h = Rc::clone(&hits);
	p.plugin
		.request(Rc::clone(&p.host_window), "fetch-analytics", Value::Null)
		.unwrap()
		.done(move |_| *h.borrow_mut() += 1);

	p.plugin_frame.run_until_idle().unwrap();
	p.host_frame.run_until_idle().unwrap();
	let err = p.plugin_frame.run_until_idle().unwrap_err();

	assert!(err.to_string().contains("no request with id 0"), "{err}");
	assert_eq!(*hits.borrow(), 1);
}

#[test]
fn independent_endpoints_do_not_collide() {
	let host_frame = Frame::new(HOST_ORIGIN);
	let first_frame = Frame::sandboxed(HOST_ORIGIN);
	let second_frame = Frame::sandboxed(HOST_ORIGIN);
	let host = Endpoint::new(Rc::new(host_frame.clone()));
	let first = Endpoint::new(Rc::new(first_frame.clone()));
	let second = Endpoint::new(Rc::new(second_frame.clone()));
	for endpoint in [&host, &first, &second] {
		endpoint.ensure("v1").unwrap();
	}
	host.on(FETCH, |message: Envelope, transport: Transport| {
		transport.respond(Reply::ok(message.body).to_value());
	});

	let answers = Rc::new(RefCell::new(Vec::new()));
	for (name, endpoint, frame) in [("first", &first, &first_frame), ("second", &second, &second_frame)] {
		let sink = Rc::clone(&answers);
		let pending = endpoint
			.request(host_frame.window_for(frame), "fetch-analytics", json!(name))
			.unwrap();
		assert_eq!(pending.req_id(), 0);
		pending.done(move |data| sink.borrow_mut().push(data));
	}
	run_all_until_idle(&[&host_frame, &first_frame, &second_frame]).unwrap();

	let mut answers = answers.borrow().clone();
	answers.sort_by_key(|v| v.as_str().map(str::to_string));
	assert_eq!(answers, vec![json!("first"), json!("second")]);
}

#[tokio::test]
async fn response_future_resolves_with_data() {
	let p = pair();
	p.host.on(FETCH, |_: Envelope, transport: Transport| {
		transport.respond(Reply::ok(json!({"count": 3})).to_value());
	});

	let response = p
		.plugin
		.request(Rc::clone(&p.host_window), "fetch-analytics", Value::Null)
		.unwrap()
		.response();
	p.pump();

	assert_eq!(response.await.unwrap(), json!({"count": 3}));
}
