use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use pe_runtime::{Error, ListenerId, MessageEvent, MessageListener, NULL_ORIGIN, Page, Task, Window};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

type JsListener = Closure<dyn FnMut(web_sys::MessageEvent)>;

/// The current document's `window`.
pub struct BrowserPage {
    window: web_sys::Window,
    listeners: RefCell<HashMap<u64, JsListener>>,
    next_listener: Cell<u64>,
}

impl BrowserPage {
    pub fn new(window: web_sys::Window) -> Self {
        Self {
            window,
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
        }
    }

    /// Page for the global `window`, if there is one.
    pub fn current() -> Option<Self> {
        web_sys::window().map(Self::new)
    }
}

impl Page for BrowserPage {
    fn origin(&self) -> String {
        self.window
            .location()
            .origin()
            .unwrap_or_else(|_| NULL_ORIGIN.to_string())
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);

        let closure = JsListener::new(move |event: web_sys::MessageEvent| {
            if let Err(err) = listener(&convert_event(&event)) {
                // Surfaces in the console as an uncaught error from the event handler.
                wasm_bindgen::throw_str(&err.to_string());
            }
        });
        if let Err(err) = self
            .window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            tracing::error!("addEventListener failed: {}", stringify_js_error(err));
        }
        self.listeners.borrow_mut().insert(id.0, closure);
        id
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        let Some(closure) = self.listeners.borrow_mut().remove(&id.0) else {
            return false;
        };
        if let Err(err) = self
            .window
            .remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            tracing::warn!("removeEventListener failed: {}", stringify_js_error(err));
        }
        true
    }

    fn defer(&self, task: Task) {
        let callback = Closure::once_into_js(move || task());
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 0)
        {
            tracing::error!("setTimeout failed: {}", stringify_js_error(err));
        }
    }

    fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

/// Another window reachable with `postMessage`.
pub struct BrowserWindow {
    inner: web_sys::Window,
}

impl BrowserWindow {
    pub fn new(inner: web_sys::Window) -> Self {
        Self { inner }
    }
}

impl Window for BrowserWindow {
    fn post_message(&self, data: &Value, target_origin: &str) -> pe_runtime::Result<()> {
        let js = to_js(data).map_err(|e| Error::Post(e.to_string()))?;
        self.inner
            .post_message(&js, target_origin)
            .map_err(|e| Error::Post(stringify_js_error(e)))
    }
}

fn convert_event(event: &web_sys::MessageEvent) -> MessageEvent {
    // Cross-origin window proxies fail `instanceof Window`, so no dyn_into here.
    let source = event.source().map(|source| {
        Rc::new(BrowserWindow::new(source.unchecked_into::<web_sys::Window>())) as Rc<dyn Window>
    });
    let data = serde_wasm_bindgen::from_value(event.data()).unwrap_or(Value::Null);
    MessageEvent::new(event.origin(), source, data)
}

pub(crate) fn to_js(value: &Value) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

pub(crate) fn stringify_js_error(err: JsValue) -> String {
    err.as_string()
        .or_else(|| js_sys::JSON::stringify(&err).ok()?.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}
