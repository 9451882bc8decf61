//! In-process frames with a FIFO task queue.
//!
//! A [`Frame`] stands in for a browser window: posted messages and deferred
//! tasks are queued and only run when the frame is pumped, so everything
//! scheduled during a turn happens strictly after that turn.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::window::{ListenerId, MessageEvent, MessageListener, NULL_ORIGIN, Page, Task, Window};

enum Job {
	Deliver(MessageEvent),
	Run(Task),
}

struct FrameInner {
	/// Origin of the frame's location.
	origin: String,
	/// Sandboxed documents have an opaque origin and send as `"null"`.
	sandboxed: bool,
	jobs: RefCell<VecDeque<Job>>,
	listeners: RefCell<Vec<(ListenerId, MessageListener)>>,
	next_listener: Cell<u64>,
	wake: Notify,
}

impl FrameInner {
	fn sender_origin(&self) -> String {
		if self.sandboxed {
			NULL_ORIGIN.to_string()
		} else {
			self.origin.clone()
		}
	}

	fn push(&self, job: Job) {
		self.jobs.borrow_mut().push_back(job);
		self.wake.notify_one();
	}
}

/// An in-process window with its own event loop.
///
/// Cloning yields another handle to the same frame.
#[derive(Clone)]
pub struct Frame {
	inner: Rc<FrameInner>,
}

impl Frame {
	pub fn new(origin: impl Into<String>) -> Self {
		Self::build(origin.into(), false)
	}

	/// A sandboxed frame loaded from `origin`.
	///
	/// Its location still reports `origin`, but messages it sends arrive with
	/// origin `"null"`.
	pub fn sandboxed(origin: impl Into<String>) -> Self {
		Self::build(origin.into(), true)
	}

	fn build(origin: String, sandboxed: bool) -> Self {
		Self {
			inner: Rc::new(FrameInner {
				origin,
				sandboxed,
				jobs: RefCell::new(VecDeque::new()),
				listeners: RefCell::new(Vec::new()),
				next_listener: Cell::new(0),
				wake: Notify::new(),
			}),
		}
	}

	/// Handle on this frame as seen from `sender`.
	///
	/// Messages posted through it arrive with `sender`'s origin, and their
	/// `source` posts back into `sender`.
	pub fn window_for(&self, sender: &Frame) -> Rc<dyn Window> {
		Rc::new(FrameWindow {
			target: Rc::downgrade(&self.inner),
			sender: Rc::downgrade(&sender.inner),
		})
	}

	/// Number of queued messages and tasks.
	pub fn queued(&self) -> usize {
		self.inner.jobs.borrow().len()
	}

	/// Runs queued work, including anything queued meanwhile, until the queue is empty.
	///
	/// Returns the number of jobs run. A failing listener does not prevent the
	/// remaining listeners from seeing the event, but the first failure stops
	/// the pump and is returned.
	pub fn run_until_idle(&self) -> Result<usize> {
		let mut ran = 0;
		loop {
			let job = self.inner.jobs.borrow_mut().pop_front();
			let Some(job) = job else {
				return Ok(ran);
			};
			ran += 1;
			self.run_job(job)?;
		}
	}

	/// Drives the frame forever, logging listener failures and carrying on.
	pub async fn run(&self) {
		loop {
			match self.run_until_idle() {
				Ok(0) => self.inner.wake.notified().await,
				Ok(ran) => tracing::trace!(origin = %self.inner.origin, ran, "frame pumped"),
				Err(e) => tracing::error!(origin = %self.inner.origin, "{e}"),
			}
		}
	}

	fn run_job(&self, job: Job) -> Result<()> {
		match job {
			Job::Run(task) => {
				task();
				Ok(())
			}
			Job::Deliver(event) => {
				let listeners: Vec<MessageListener> = self
					.inner
					.listeners
					.borrow()
					.iter()
					.map(|(_, l)| Rc::clone(l))
					.collect();

				let mut first_error = None;
				for listener in listeners {
					if let Err(e) = listener(&event) {
						first_error.get_or_insert(e);
					}
				}
				first_error.map_or(Ok(()), Err)
			}
		}
	}
}

impl Page for Frame {
	fn origin(&self) -> String {
		self.inner.origin.clone()
	}

	fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
		let id = ListenerId(self.inner.next_listener.get());
		self.inner.next_listener.set(id.0 + 1);
		self.inner.listeners.borrow_mut().push((id, listener));
		id
	}

	fn remove_message_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.inner.listeners.borrow_mut();
		let before = listeners.len();
		listeners.retain(|(lid, _)| *lid != id);
		listeners.len() != before
	}

	fn defer(&self, task: Task) {
		self.inner.push(Job::Run(task));
	}

	fn listener_count(&self) -> usize {
		self.inner.listeners.borrow().len()
	}
}

struct FrameWindow {
	target: Weak<FrameInner>,
	sender: Weak<FrameInner>,
}

impl Window for FrameWindow {
	fn post_message(&self, data: &Value, target_origin: &str) -> Result<()> {
		let target = self
			.target
			.upgrade()
			.ok_or_else(|| Error::WindowClosed(target_origin.to_string()))?;

		if target_origin != "*" && (target.sandboxed || target_origin != target.origin) {
			tracing::debug!(
				target_origin,
				origin = %target.origin,
				"postMessage target origin mismatch, message dropped"
			);
			return Ok(());
		}

		let origin = self
			.sender
			.upgrade()
			.map(|s| s.sender_origin())
			.unwrap_or_else(|| NULL_ORIGIN.to_string());
		let reply: Rc<dyn Window> = Rc::new(FrameWindow {
			target: self.sender.clone(),
			sender: self.target.clone(),
		});

		target.push(Job::Deliver(MessageEvent::new(origin, Some(reply), data.clone())));
		Ok(())
	}
}

/// Pumps every frame until none of them has queued work.
///
/// Returns the total number of jobs run.
pub fn run_all_until_idle(frames: &[&Frame]) -> Result<usize> {
	let mut total = 0;
	loop {
		let mut ran = 0;
		for frame in frames {
			ran += frame.run_until_idle()?;
		}
		if ran == 0 {
			return Ok(total);
		}
		total += ran;
	}
}
