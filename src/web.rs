//! Browser adapters: localStorage backend, storage-event bridge, DOM event
//! bridge, and console diagnostics. Everything `web-sys` lives here; the
//! core modules never touch the platform.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use crate::guard::StateGuard;
use crate::store::{DiagnosticSink, StorageBackend, StorageError};
use crate::sync::{ExternalChange, GameEvent};

/// Install the panic hook once. Call from the host before anything else.
pub fn init() {
    console_error_panic_hook::set_once();
}

/// `window.localStorage`, if the platform grants it.
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

fn rejected(key: &str, err: JsValue) -> StorageError {
    StorageError::Rejected {
        key: key.to_string(),
        reason: format!("{err:?}"),
    }
}

/// localStorage-backed medium. Quota and privacy-mode failures surface as
/// [`StorageError`] and put the store into degraded mode.
#[derive(Default)]
pub struct LocalStorageBackend;

impl LocalStorageBackend {
    pub fn new() -> Self {
        Self
    }
}

impl StorageBackend for LocalStorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let storage = local_storage().ok_or(StorageError::Unavailable)?;
        storage.get_item(key).map_err(|e| rejected(key, e))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let storage = local_storage().ok_or(StorageError::Unavailable)?;
        storage.set_item(key, value).map_err(|e| rejected(key, e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let storage = local_storage().ok_or(StorageError::Unavailable)?;
        storage.remove_item(key).map_err(|e| rejected(key, e))
    }
}

/// Console-backed diagnostic sink.
#[derive(Default)]
pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn warn(&self, message: &str) {
        web_sys::console::warn_1(&format!("game-state-guard: {message}").into());
    }
}

/// Forward this window's `storage` events into the guard.
///
/// The platform fires `storage` only for writes from *other* tabs, so this
/// is exactly the external channel: each delivery is mapped to an
/// [`ExternalChange`] and handed to [`StateGuard::reconcile_external`].
/// The listener (and the guard handle it captures) lives for the rest of
/// the page lifetime.
pub fn attach_storage_listener<B>(guard: Rc<RefCell<StateGuard<B>>>) -> Result<(), JsValue>
where
    B: StorageBackend + 'static,
{
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let closure = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(
        move |event: web_sys::StorageEvent| {
            // key() is None when the other tab called clear()
            let Some(key) = event.key() else { return };
            let change = ExternalChange {
                key,
                old_value: event.old_value(),
                new_value: event.new_value(),
            };
            guard.borrow_mut().reconcile_external(&change);
        },
    );
    window.add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

/// Mirror an in-process event as a DOM `CustomEvent` so the surrounding
/// JS UI can listen without linking this crate.
pub fn dispatch_dom_event(event: &GameEvent) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let detail = js_sys::JSON::parse(&event.payload_json()).unwrap_or(JsValue::NULL);
    let init = web_sys::CustomEventInit::new();
    init.set_detail(&detail);
    let dom_event = web_sys::CustomEvent::new_with_event_init_dict(event.kind(), &init)?;
    window.dispatch_event(&dom_event)?;
    Ok(())
}

/// Subscriber that republishes every in-process event to the DOM.
#[derive(Default)]
pub struct DomBridge;

impl crate::sync::Subscriber for DomBridge {
    fn on_event(&mut self, event: &GameEvent) {
        if let Err(err) = dispatch_dom_event(event) {
            web_sys::console::warn_1(
                &format!("game-state-guard: DOM event dispatch failed: {err:?}").into(),
            );
        }
    }
}
