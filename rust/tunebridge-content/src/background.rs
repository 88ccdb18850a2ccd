use std::rc::Rc;

use crate::{ContentError, IdentityMessage};

/// Fire-and-forget delivery of messages to the extension's background
/// process.
pub trait BackgroundPort {
    /// Hands `message` to the background process without waiting for an
    /// answer.
    fn send(&self, message: &IdentityMessage) -> Result<(), ContentError>;
}

impl<B> BackgroundPort for &B
where
    B: BackgroundPort + ?Sized,
{
    fn send(&self, message: &IdentityMessage) -> Result<(), ContentError> {
        (**self).send(message)
    }
}

impl<B> BackgroundPort for Rc<B>
where
    B: BackgroundPort + ?Sized,
{
    fn send(&self, message: &IdentityMessage) -> Result<(), ContentError> {
        (**self).send(message)
    }
}

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub use web::*;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
mod web {
    use js_sys::{Function, Promise, Reflect};
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::{JsFuture, spawn_local};

    use super::BackgroundPort;
    use crate::{
        ContentError, IdentityMessage,
        web::{describe, to_js},
    };

    /// `chrome.runtime.sendMessage`.
    #[derive(Debug, Clone)]
    pub struct ChromeRuntime {
        runtime: JsValue,
        send_message: Function,
    }

    impl ChromeRuntime {
        /// Looks up `chrome.runtime` in the global scope.
        pub fn connect() -> Result<Self, ContentError> {
            let runtime = crate::web::chrome_runtime()?;
            let send_message = Reflect::get(&runtime, &"sendMessage".into())
                .ok()
                .and_then(|function| function.dyn_into::<Function>().ok())
                .ok_or_else(|| {
                    ContentError::Unavailable("chrome.runtime.sendMessage".to_string())
                })?;

            Ok(Self {
                runtime,
                send_message,
            })
        }
    }

    impl BackgroundPort for ChromeRuntime {
        fn send(&self, message: &IdentityMessage) -> Result<(), ContentError> {
            let message = to_js(message)?;
            let sent = self
                .send_message
                .call1(&self.runtime, &message)
                .map_err(|error| ContentError::Background(describe(&error)))?;

            // Newer runtimes answer with a promise that rejects when nobody
            // is listening; nothing is waiting for it.
            if let Ok(sent) = sent.dyn_into::<Promise>() {
                spawn_local(async move {
                    if let Err(error) = JsFuture::from(sent).await {
                        tracing::debug!(
                            error = %describe(&error),
                            "background did not take the message"
                        );
                    }
                });
            }

            Ok(())
        }
    }
}
