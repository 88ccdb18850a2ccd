//! Browser glue: wires the relay and the router to the window and to
//! `chrome.runtime`.

use std::rc::Rc;

use js_sys::{Function, JSON, Reflect};
use serde::Serialize;
use serde_json::Value;
use tunebridge_store::{IndexedDbTrackDatabase, ShardedStoreReader};
use wasm_bindgen::{JsCast, JsValue, prelude::Closure};
use wasm_bindgen_futures::spawn_local;
use web_sys::{MessageEvent, Window};

use crate::{
    BridgeConfig, ChromeRuntime, ContentError, IdentityRelay, LocalTrackSource, LocalTracks,
    MessageSource, Reply, RequestRouter, Response, ScriptInjector, TokenRefresh, UserSession,
    user_index,
};

type Relay = IdentityRelay<ScriptInjector, ChromeRuntime>;

/// Starts the content script with the default configuration.
pub fn start() -> Result<(), ContentError> {
    start_with(BridgeConfig::default())
}

/// Starts the content script.
///
/// The background listener is registered before the page is probed so that
/// no request can arrive unheard.
pub fn start_with(config: BridgeConfig) -> Result<(), ContentError> {
    console_error_panic_hook::set_once();
    // A subscriber may already be installed when the script is re-injected.
    let _ = tracing_wasm::try_set_as_global_default();

    let window = web_sys::window().ok_or_else(|| ContentError::Unavailable("window".into()))?;
    let document = window
        .document()
        .ok_or_else(|| ContentError::Unavailable("document".into()))?;
    let search = window.location().search().map_err(|error| {
        ContentError::Unavailable(format!("location.search: {}", describe(&error)))
    })?;

    let session = UserSession::default();
    let relay: Rc<Relay> = Rc::new(
        IdentityRelay::new(
            ScriptInjector::new(document),
            ChromeRuntime::connect()?,
            session.clone(),
            user_index(&search),
        )
        .with_probe(config.probe),
    );

    let database = IndexedDbTrackDatabase::from_global()
        .map_err(|error| ContentError::Unavailable(error.to_string()))?;
    let reader = ShardedStoreReader::new(database).with_layout(config.store);
    let router = RequestRouter::new(LocalTrackSource::new(reader, session), relay.clone());

    listen_for_requests(router)?;
    listen_for_page(&window, relay.clone())?;
    relay.announce()?;

    tracing::debug!("content script started");
    Ok(())
}

fn listen_for_requests<T, R>(router: RequestRouter<T, R>) -> Result<(), ContentError>
where
    T: LocalTracks + 'static,
    R: TokenRefresh + 'static,
{
    let on_message = Reflect::get(&chrome_runtime()?, &"onMessage".into())
        .map_err(|_| ContentError::Unavailable("chrome.runtime.onMessage".into()))?;
    let add_listener = Reflect::get(&on_message, &"addListener".into())
        .ok()
        .and_then(|function| function.dyn_into::<Function>().ok())
        .ok_or_else(|| ContentError::Unavailable("chrome.runtime.onMessage.addListener".into()))?;

    // Returning `true` keeps `send_response` usable after the listener
    // returns.
    let callback = Closure::wrap(Box::new(
        move |message: JsValue, _sender: JsValue, send_response: Function| -> JsValue {
            let message = from_js(&message).unwrap_or(Value::Null);
            tracing::debug!(%message, "request from background");

            match router.route_value(&message) {
                Reply::Now(response) => {
                    respond(&send_response, &response);
                    JsValue::FALSE
                }
                Reply::Later(pending) => {
                    spawn_local(async move {
                        let response = pending.await;
                        respond(&send_response, &response);
                    });
                    JsValue::TRUE
                }
                Reply::Silent => JsValue::FALSE,
            }
        },
    )
        as Box<dyn FnMut(JsValue, JsValue, Function) -> JsValue>);

    add_listener
        .call1(&on_message, callback.as_ref())
        .map_err(|error| ContentError::Unavailable(describe(&error)))?;

    // The listener lives as long as the page.
    callback.forget();
    Ok(())
}

fn listen_for_page(window: &Window, relay: Rc<Relay>) -> Result<(), ContentError> {
    let own_window: JsValue = window.clone().into();

    let callback = Closure::wrap(Box::new(move |event: MessageEvent| {
        let source = message_source(&event, &own_window);
        let data = from_js(&event.data()).unwrap_or(Value::Null);

        if let Err(error) = relay.receive(source, &data) {
            tracing::error!(%error, "failed to forward identity");
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    window
        .add_event_listener_with_callback("message", callback.as_ref().unchecked_ref())
        .map_err(|error| ContentError::Unavailable(describe(&error)))?;

    callback.forget();
    Ok(())
}

/// Whether `event` was posted by `own_window` itself.
fn message_source(event: &MessageEvent, own_window: &JsValue) -> MessageSource {
    match event.source() {
        Some(source) if js_sys::Object::is(&source, own_window) => MessageSource::OwnWindow,
        _ => MessageSource::Foreign,
    }
}

fn respond(send_response: &Function, response: &Response) {
    let sent = to_js(response).and_then(|value| {
        send_response
            .call1(&JsValue::UNDEFINED, &value)
            .map_err(|error| ContentError::Background(describe(&error)))
    });

    if let Err(error) = sent {
        tracing::error!(%error, "failed to answer background request");
    }
}

/// `chrome.runtime`, when the script runs as an extension content script.
pub(crate) fn chrome_runtime() -> Result<JsValue, ContentError> {
    let chrome = Reflect::get(&js_sys::global(), &"chrome".into()).unwrap_or(JsValue::UNDEFINED);
    let runtime = if chrome.is_undefined() || chrome.is_null() {
        JsValue::UNDEFINED
    } else {
        Reflect::get(&chrome, &"runtime".into()).unwrap_or(JsValue::UNDEFINED)
    };

    if runtime.is_undefined() || runtime.is_null() {
        return Err(ContentError::Unavailable("chrome.runtime".into()));
    }
    Ok(runtime)
}

/// Converts a Rust value into a plain JavaScript value.
pub(crate) fn to_js<T>(value: &T) -> Result<JsValue, ContentError>
where
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string(value)?;
    JSON::parse(&text).map_err(|error| ContentError::Serialization(describe(&error)))
}

/// Converts a JavaScript value into JSON, or `None` when it has no JSON
/// form (`undefined`, functions, cyclic objects).
pub(crate) fn from_js(value: &JsValue) -> Option<Value> {
    let text = JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&text).ok()
}

pub(crate) fn describe(error: &JsValue) -> String {
    error
        .as_string()
        .or_else(|| {
            Reflect::get(error, &"message".into())
                .ok()
                .and_then(|message| message.as_string())
        })
        .unwrap_or_else(|| format!("{error:?}"))
}
