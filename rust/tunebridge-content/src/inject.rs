use std::rc::Rc;

use crate::ContentError;

/// Runs code in the page's own JavaScript context.
///
/// Content scripts live in an isolated world and cannot see the page's
/// globals; injected code can. Injection is one-way: the code reports back,
/// if at all, by posting a message to the window.
pub trait Injector {
    /// Runs `code` once, synchronously, in the page's context.
    fn inject(&self, code: &str) -> Result<(), ContentError>;
}

impl<I> Injector for &I
where
    I: Injector + ?Sized,
{
    fn inject(&self, code: &str) -> Result<(), ContentError> {
        (**self).inject(code)
    }
}

impl<I> Injector for Rc<I>
where
    I: Injector + ?Sized,
{
    fn inject(&self, code: &str) -> Result<(), ContentError> {
        (**self).inject(code)
    }
}

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub use web::*;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
mod web {
    use web_sys::{Document, Node};

    use super::Injector;
    use crate::{ContentError, web::describe};

    /// Injects code by inserting an inline `<script>` element and removing it
    /// again once it has run.
    #[derive(Debug, Clone)]
    pub struct ScriptInjector {
        document: Document,
    }

    impl ScriptInjector {
        /// Injects into `document`.
        pub fn new(document: Document) -> Self {
            Self { document }
        }
    }

    impl Injector for ScriptInjector {
        fn inject(&self, code: &str) -> Result<(), ContentError> {
            let script = self
                .document
                .create_element("script")
                .map_err(|error| ContentError::Injection(describe(&error)))?;
            script.set_text_content(Some(code));

            let parent: Node = match self.document.head() {
                Some(head) => head.into(),
                None => self
                    .document
                    .document_element()
                    .ok_or_else(|| {
                        ContentError::Injection("document has no root element".to_string())
                    })?
                    .into(),
            };

            parent
                .append_child(&script)
                .map_err(|error| ContentError::Injection(describe(&error)))?;
            script.remove();

            Ok(())
        }
    }
}
