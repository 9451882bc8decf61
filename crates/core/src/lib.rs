//! Plugin endpoint - request/response messaging between windows
//!
//! Lets an embedded plugin frame and its hosting page exchange asynchronous
//! requests over cross-window `postMessage`.
//!
//! - **[`Endpoint`]**: per-page context holding the handler registry, the
//!   table of in-flight requests and the handshake identity
//! - **Dispatcher**: [`Endpoint::dispatch`], the single `message` listener
//! - **[`Transport`]**: one logical exchange, either sending a request or
//!   answering exactly once
//! - **[`PendingRequest`]**: `done`/`fail`/`always` completion of a request
//!
//! # Flow
//!
//! ```text
//! plugin                                   host
//!   ensure("v1")                             ensure("v1")
//!   on_init(|data, t| ...)                   on("go.cd.analytics.v1.fetch", h)
//!                         ◀── init ───────   init(plugin_window, {uid, pluginId})
//!   request("fetch", d) ─── request ──────▶  h(message, transport)
//!   .done(..)           ◀── response ─────   transport.respond(reply)
//! ```
//!
//! Misuse by the caller (blank key, unknown version, orphan response) is an
//! `Err`; malformed traffic from other windows is logged and dropped.

pub mod config;
mod dispatch;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod pending;
pub mod transport;

pub use config::EndpointConfig;
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use handlers::{Api, ApiMember, Handler};
pub use pe_protocol::{Envelope, Head, Identity, MessageType, ProtocolVersion, Reply};
pub use pe_runtime::{Frame, MessageEvent, Page, Window, run_all_until_idle};
pub use pending::{PendingRequest, ResponseFuture};
pub use transport::Transport;
