use std::rc::Rc;

use js_sys::{Array, Function, Object};
use pe::{Api, Endpoint, EndpointConfig, Envelope, PendingRequest, Transport, Window};
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::browser::{BrowserPage, BrowserWindow, stringify_js_error, to_js};

fn js_error(err: impl std::fmt::Display) -> JsError {
    JsError::new(&err.to_string())
}

fn from_js(value: JsValue) -> Result<Value, JsError> {
    serde_wasm_bindgen::from_value(value).map_err(js_error)
}

fn window(target: web_sys::Window) -> Rc<dyn Window> {
    Rc::new(BrowserWindow::new(target))
}

/// Calls a JS callback, logging instead of propagating anything it throws.
fn invoke(callback: &Function, args: &[JsValue]) {
    let result = match args {
        [] => callback.call0(&JsValue::NULL),
        [a] => callback.call1(&JsValue::NULL, a),
        [a, b, ..] => callback.call2(&JsValue::NULL, a, b),
    };
    if let Err(err) = result {
        tracing::error!("callback threw: {}", stringify_js_error(err));
    }
}

fn js_handler(callback: Function) -> impl Fn(Envelope, Transport) + 'static {
    move |message: Envelope, transport: Transport| match to_js(&message.to_value()) {
        Ok(message) => invoke(&callback, &[message, JsTransport { inner: transport }.into()]),
        Err(err) => tracing::error!(id = message.head.req_id, "message could not be converted for JS: {err}"),
    }
}

/// Endpoint bound to the current window.
#[wasm_bindgen]
pub struct PluginEndpoint {
    endpoint: Endpoint,
}

#[wasm_bindgen]
impl PluginEndpoint {
    /// `acceptedOrigins` extends the default `"null"` and same-origin senders.
    #[wasm_bindgen(constructor)]
    pub fn new(accepted_origins: Option<Vec<String>>) -> Result<PluginEndpoint, JsError> {
        let page = BrowserPage::current().ok_or_else(|| JsError::new("no global window"))?;
        let config = accepted_origins
            .unwrap_or_default()
            .into_iter()
            .fold(EndpointConfig::default(), |config, origin| config.accept_origin(origin));
        Ok(Self {
            endpoint: Endpoint::with_config(Rc::new(page), config),
        })
    }

    pub fn ensure(&self, version: &str) -> Result<(), JsError> {
        self.endpoint.ensure(version).map_err(js_error)?;
        Ok(())
    }

    /// Registers `handler(message, transport)` under the fully-qualified `key`.
    pub fn on(&self, key: String, handler: Function) {
        self.endpoint.on(key, js_handler(handler));
    }

    /// Registers every function-valued property of `api` under its name.
    pub fn define(&self, api: &Object) {
        let mut members = Api::new();
        for entry in Object::entries(api).iter() {
            let entry = Array::from(&entry);
            let Some(name) = entry.get(0).as_string() else {
                continue;
            };
            let member = entry.get(1);
            members = match member.dyn_into::<Function>() {
                Ok(function) => members.function(name, js_handler(function)),
                Err(other) => members.value(name, from_js(other).unwrap_or(Value::Null)),
            };
        }
        self.endpoint.define(&members);
    }

    #[wasm_bindgen(js_name = onInit)]
    pub fn on_init(&self, initializer: Function) -> Result<(), JsError> {
        self.endpoint
            .on_init(move |data: Value, transport: Transport| match to_js(&data) {
                Ok(data) => invoke(&initializer, &[data, JsTransport { inner: transport }.into()]),
                Err(err) => tracing::error!("initial data could not be converted for JS: {err}"),
            })
            .map_err(js_error)?;
        Ok(())
    }

    /// Sends the handshake to `target`, typically an iframe's `contentWindow`.
    pub fn init(&self, target: web_sys::Window, data: JsValue) -> Result<(), JsError> {
        self.endpoint.init(&window(target), from_js(data)?).map_err(js_error)
    }

    pub fn request(&self, target: web_sys::Window, key: &str, data: JsValue) -> Result<JsPending, JsError> {
        let pending = self
            .endpoint
            .request(window(target), key, from_js(data)?)
            .map_err(js_error)?;
        Ok(JsPending { inner: pending })
    }

    pub fn reset(&self) {
        self.endpoint.reset();
    }

    #[wasm_bindgen(getter, js_name = pendingCount)]
    pub fn pending_count(&self) -> usize {
        self.endpoint.pending_count()
    }
}

/// JS view of a [`PendingRequest`]. Setters return the same request for chaining.
#[wasm_bindgen]
#[derive(Clone)]
pub struct JsPending {
    inner: PendingRequest,
}

#[wasm_bindgen]
impl JsPending {
    #[wasm_bindgen(getter, js_name = reqId)]
    pub fn req_id(&self) -> f64 {
        self.inner.req_id() as f64
    }

    pub fn done(&self, callback: Function) -> JsPending {
        self.inner.done(move |data| match to_js(&data) {
            Ok(data) => invoke(&callback, &[data]),
            Err(err) => tracing::error!("response data could not be converted for JS: {err}"),
        });
        self.clone()
    }

    pub fn fail(&self, callback: Function) -> JsPending {
        self.inner.fail(move |errors| match to_js(&errors) {
            Ok(errors) => invoke(&callback, &[errors]),
            Err(err) => tracing::error!("response errors could not be converted for JS: {err}"),
        });
        self.clone()
    }

    pub fn always(&self, callback: Function) -> JsPending {
        self.inner.always(move || invoke(&callback, &[]));
        self.clone()
    }

    /// Promise resolving with the reply data, or rejecting with its errors.
    pub fn response(&self) -> js_sys::Promise {
        let response = self.inner.response();
        wasm_bindgen_futures::future_to_promise(async move {
            match response.await {
                Ok(data) => to_js(&data).map_err(JsValue::from),
                Err(pe::Error::Failed { errors, .. }) => Err(to_js(&errors).map_err(JsValue::from)?),
                Err(err) => Err(JsValue::from_str(&err.to_string())),
            }
        })
    }
}

/// JS view of a [`Transport`] handed to handlers.
#[wasm_bindgen]
pub struct JsTransport {
    inner: Transport,
}

#[wasm_bindgen]
impl JsTransport {
    /// Id being answered, `undefined` for outbound transports and handshakes.
    #[wasm_bindgen(getter, js_name = responseId)]
    pub fn response_id(&self) -> Option<f64> {
        self.inner.response_id().map(|id| id as f64)
    }

    /// Answers the request. Only the first call on an inbound transport posts.
    pub fn respond(&self, data: JsValue) -> Result<(), JsError> {
        self.inner.respond(from_js(data)?);
        Ok(())
    }

    /// Sends a request back to the window this transport talks to.
    pub fn request(&self, key: &str, data: JsValue) -> Result<JsPending, JsError> {
        let pending = self.inner.request(key, from_js(data)?).map_err(js_error)?;
        Ok(JsPending { inner: pending })
    }
}
