//! Browser bindings for the plugin endpoint.
//!
//! [`BrowserPage`] and [`BrowserWindow`] put the endpoint on a real `window`;
//! the `#[wasm_bindgen]` exports give host pages and plugin frames a
//! `PluginEndpoint` class to drive it from JavaScript:
//!
//! ```js
//! const endpoint = new PluginEndpoint();
//! endpoint.ensure("v1");
//! endpoint.onInit((data, transport) => render(data));
//! endpoint.request(window.parent, "fetch-analytics", { metric: "builds" })
//!     .done(draw)
//!     .fail(showErrors);
//! ```

mod bindings;
mod browser;
mod logging;

use wasm_bindgen::prelude::*;

pub use bindings::{JsPending, JsTransport, PluginEndpoint};
pub use browser::{BrowserPage, BrowserWindow};
pub use logging::init_logging;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}
