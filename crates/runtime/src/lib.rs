//! Plugin endpoint runtime - windows, pages and the event loop
//!
//! The endpoint only needs four things from its environment:
//!
//! - **Window**: a handle on some other window that accepts `postMessage`
//! - **Page**: the local window, which knows its origin, carries `message`
//!   listeners and can defer work until after the current turn
//! - **MessageEvent**: what a listener receives (`origin`, `source`, `data`)
//! - **Frame**: an in-process [`Page`] with its own task queue, used natively
//!   and in tests where no browser is available
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   window_for()    ┌──────────────┐
//! │ Frame (host) │ ────────────────▶ │ Frame (plug) │
//! │  task queue  │ ◀──────────────── │  task queue  │
//! └──────┬───────┘   event.source    └──────┬───────┘
//!        │ listeners                        │ listeners
//!   pe::Endpoint                       pe::Endpoint
//! ```
//!
//! Everything here is single-threaded (`Rc`/`RefCell`), like the browser event
//! loop it stands in for.

pub mod error;
pub mod frame;
pub mod window;

pub use error::{Error, Result};
pub use frame::{Frame, run_all_until_idle};
pub use window::{ListenerId, MessageEvent, MessageListener, NULL_ORIGIN, Page, Task, Window};
