//! Wire types for the plugin endpoint protocol.
//!
//! A plugin frame and its hosting page talk over cross-window `postMessage`
//! using a small request/response envelope:
//!
//! ```text
//! { "head": { "type": "request", "reqId": 3, "key": "go.cd.analytics.v1.fetch" },
//!   "body": { ... } }
//! ```
//!
//! This crate contains the serde types for that envelope, the protocol
//! version set and key namespacing rules, and [`classify`], which validates
//! untrusted inbound data in the order the dispatcher checks it.
//!
//! Types in this crate are:
//! - **Pure data**: no windows, listeners or event loops
//! - **Stable**: changes only when the wire format changes

pub mod envelope;
pub mod error;
pub mod version;

pub use envelope::*;
pub use error::{Error, Result};
pub use version::*;
