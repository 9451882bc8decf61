//! In-flight request completion.
//!
//! A [`PendingRequest`] has one slot each for `done`, `fail` and `always`.
//! Setting a slot replaces whatever was there before. When the matching
//! response arrives the request settles exactly once: `fail(errors)` if the
//! reply carries errors, `done(data)` otherwise, then `always()`.
//!
//! There is no timeout and no cancellation. A request that is never answered
//! stays in its endpoint's table until [`Endpoint::reset`](crate::Endpoint::reset).

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use pe_protocol::Reply;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

type ValueCallback = Box<dyn FnOnce(Value)>;
type Waiter = oneshot::Sender<std::result::Result<Value, Value>>;

#[derive(Default)]
struct Slots {
	done: Option<ValueCallback>,
	fail: Option<ValueCallback>,
	always: Option<Box<dyn FnOnce()>>,
	waiter: Option<Waiter>,
	settled: bool,
}

/// Handle on a request awaiting its response.
///
/// Clones share the same slots.
#[derive(Clone)]
pub struct PendingRequest {
	id: u64,
	slots: Rc<RefCell<Slots>>,
}

impl PendingRequest {
	pub(crate) fn new(id: u64) -> Self {
		Self {
			id,
			slots: Rc::new(RefCell::new(Slots::default())),
		}
	}

	/// Request id on the wire.
	pub fn req_id(&self) -> u64 {
		self.id
	}

	pub fn is_settled(&self) -> bool {
		self.slots.borrow().settled
	}

	/// Sets the success callback.
	pub fn done<F>(&self, f: F) -> &Self
	where
		F: FnOnce(Value) + 'static,
	{
		self.slots.borrow_mut().done = Some(Box::new(f));
		self
	}

	/// Sets the failure callback, called with the reply's errors.
	pub fn fail<F>(&self, f: F) -> &Self
	where
		F: FnOnce(Value) + 'static,
	{
		self.slots.borrow_mut().fail = Some(Box::new(f));
		self
	}

	/// Sets the callback that runs after `done` or `fail`.
	pub fn always<F>(&self, f: F) -> &Self
	where
		F: FnOnce() + 'static,
	{
		self.slots.borrow_mut().always = Some(Box::new(f));
		self
	}

	/// Future resolving when the request settles.
	///
	/// Independent of the callback slots. Calling this again replaces the
	/// earlier future's sender, which then resolves to [`Error::Abandoned`].
	pub fn response(&self) -> ResponseFuture {
		let (tx, rx) = oneshot::channel();
		self.slots.borrow_mut().waiter = Some(tx);
		ResponseFuture { id: self.id, rx }
	}

	/// Releases a waiting future without running any callback.
	pub(crate) fn abandon(&self) {
		self.slots.borrow_mut().waiter.take();
	}

	/// Settles the request. Later calls are ignored.
	pub(crate) fn complete(&self, reply: Reply) {
		let (done, fail, always, waiter) = {
			let mut slots = self.slots.borrow_mut();
			if slots.settled {
				return;
			}
			slots.settled = true;
			(
				slots.done.take(),
				slots.fail.take(),
				slots.always.take(),
				slots.waiter.take(),
			)
		};

		let outcome = match reply.errors {
			Some(errors) => {
				if let Some(fail) = fail {
					fail(errors.clone());
				}
				Err(errors)
			}
			None => {
				let data = reply.data.unwrap_or(Value::Null);
				if let Some(done) = done {
					done(data.clone());
				}
				Ok(data)
			}
		};
		if let Some(always) = always {
			always();
		}
		if let Some(waiter) = waiter {
			let _ = waiter.send(outcome);
		}
	}
}

impl std::fmt::Debug for PendingRequest {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PendingRequest")
			.field("id", &self.id)
			.field("settled", &self.is_settled())
			.finish()
	}
}

/// Future returned by [`PendingRequest::response`].
pub struct ResponseFuture {
	id: u64,
	rx: oneshot::Receiver<std::result::Result<Value, Value>>,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let id = self.id;
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(Ok(Ok(data))) => Poll::Ready(Ok(data)),
			Poll::Ready(Ok(Err(errors))) => Poll::Ready(Err(Error::Failed { id, errors })),
			Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Abandoned(id))),
			Poll::Pending => Poll::Pending,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use serde_json::json;

	use super::*;

	#[test]
	fn test_done_then_always() {
		let pending = PendingRequest::new(1);
		let got = Rc::new(RefCell::new(None));
		let order = Rc::new(RefCell::new(Vec::new()));

		let (g, o1, o2) = (Rc::clone(&got), Rc::clone(&order), Rc::clone(&order));
		pending
			.done(move |data| {
				*g.borrow_mut() = Some(data);
				o1.borrow_mut().push("done");
			})
			.fail(|_| panic!("fail must not run"))
			.always(move || o2.borrow_mut().push("always"));

		pending.complete(Reply::ok(json!({"rows": 3})));

		assert_eq!(*got.borrow(), Some(json!({"rows": 3})));
		assert_eq!(*order.borrow(), vec!["done", "always"]);
		assert!(pending.is_settled());
	}

	#[test]
	fn test_errors_route_to_fail() {
		let pending = PendingRequest::new(2);
		let errors = Rc::new(RefCell::new(None));
		let always = Rc::new(Cell::new(false));

		let (e, a) = (Rc::clone(&errors), Rc::clone(&always));
		pending
			.done(|_| panic!("done must not run"))
			.fail(move |errs| *e.borrow_mut() = Some(errs))
			.always(move || a.set(true));

		pending.complete(Reply::err(json!(["not found"])));

		assert_eq!(*errors.borrow(), Some(json!(["not found"])));
		assert!(always.get());
	}

	#[test]
	fn test_last_callback_wins() {
		let pending = PendingRequest::new(3);
		let hits = Rc::new(RefCell::new(Vec::new()));

		let (first, second) = (Rc::clone(&hits), Rc::clone(&hits));
		pending
			.done(move |_| first.borrow_mut().push("first"))
			.done(move |_| second.borrow_mut().push("second"));
		pending.complete(Reply::ok(1));

		assert_eq!(*hits.borrow(), vec!["second"]);
	}

	#[test]
	fn test_settles_at_most_once() {
		let pending = PendingRequest::new(4);
		let count = Rc::new(Cell::new(0));
		let c = Rc::clone(&count);
		pending.always(move || c.set(c.get() + 1));

		pending.complete(Reply::ok(1));
		pending.complete(Reply::ok(2));

		assert_eq!(count.get(), 1);
	}

	#[test]
	fn test_missing_data_is_null() {
		let pending = PendingRequest::new(5);
		let got = Rc::new(RefCell::new(None));
		let g = Rc::clone(&got);
		pending.done(move |data| *g.borrow_mut() = Some(data));

		pending.complete(Reply::default());
		assert_eq!(*got.borrow(), Some(Value::Null));
	}

	#[tokio::test]
	async fn test_response_future_resolves() {
		let pending = PendingRequest::new(6);
		let fut = pending.response();
		pending.complete(Reply::ok("hi"));
		assert_eq!(fut.await.unwrap(), json!("hi"));
	}

	#[tokio::test]
	async fn test_response_future_reports_failure() {
		let pending = PendingRequest::new(7);
		let fut = pending.response();
		pending.complete(Reply::err("denied"));
		match fut.await {
			Err(Error::Failed { id, errors }) => {
				assert_eq!(id, 7);
				assert_eq!(errors, json!("denied"));
			}
			other => panic!("expected Failed, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_dropped_request_abandons_future() {
		let fut = PendingRequest::new(8).response();
		assert!(matches!(fut.await, Err(Error::Abandoned(8))));
	}
}
