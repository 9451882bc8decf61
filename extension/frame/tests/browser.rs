//! Runs against a real window: `wasm-pack test --headless --firefox extension/frame`.

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use pe::{Endpoint, Envelope, Page, Reply, Transport, Window};
use pe_ext_frame::{BrowserPage, BrowserWindow};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn own_window() -> Rc<dyn Window> {
    Rc::new(BrowserWindow::new(web_sys::window().unwrap()))
}

#[wasm_bindgen_test]
fn page_reports_location_origin() {
    let page = BrowserPage::current().unwrap();
    let expected = web_sys::window().unwrap().location().origin().unwrap();
    assert_eq!(page.origin(), expected);
}

#[wasm_bindgen_test]
async fn request_to_own_window_round_trips() {
    let endpoint = Endpoint::new(Rc::new(BrowserPage::current().unwrap()));
    endpoint.ensure("v1").unwrap();
    endpoint.on("go.cd.analytics.v1.echo", |message: Envelope, transport: Transport| {
        transport.respond(Reply::ok(message.body).to_value());
    });

    let response = endpoint
        .request(own_window(), "echo", json!({"metric": "builds"}))
        .unwrap()
        .response();

    assert_eq!(response.await.unwrap(), json!({"metric": "builds"}));
    assert_eq!(endpoint.pending_count(), 0);
    endpoint.reset();
}

#[wasm_bindgen_test]
async fn handshake_sets_identity() {
    let endpoint = Endpoint::new(Rc::new(BrowserPage::current().unwrap()));
    endpoint.ensure("v1").unwrap();

    let (tx, rx) = oneshot::channel();
    let tx = RefCell::new(Some(tx));
    endpoint
        .on_init(move |data: Value, _: Transport| {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(data);
            }
        })
        .unwrap();

    endpoint
        .init(&own_window(), json!({"uid": "u-3", "pluginId": "p", "initialData": 7}))
        .unwrap();

    assert_eq!(rx.await.unwrap(), json!(7));
    assert_eq!(endpoint.identity().uid.as_deref(), Some("u-3"));
    endpoint.reset();
}

#[wasm_bindgen_test]
fn reset_detaches_listener() {
    let page = Rc::new(BrowserPage::current().unwrap());
    let endpoint = Endpoint::new(page.clone());
    endpoint.ensure("v1").unwrap();
    assert_eq!(page.listener_count(), 1);

    endpoint.reset();
    assert_eq!(page.listener_count(), 0);
    assert!(!endpoint.is_attached());
}

