//! Stand-ins for the page world and the background process.

use std::{cell::RefCell, rc::Rc};

use serde_json::{Map, Value, json};

use crate::{BackgroundPort, ContentError, IdentityMessage, Injector};

#[derive(Debug, Default)]
struct PageState {
    marker: Option<String>,
    has_context: bool,
    user_id: Option<Value>,
    injected: Vec<String>,
    posts: Vec<Value>,
}

/// A page that answers the identity probe the way a real page with the
/// default probe configuration would.
///
/// Every injected script is recorded. When it is the probe and the page has
/// a signed-in user, the announcement the probe would post is queued until
/// [FakePage::take_posts] collects it.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    state: Rc<RefCell<PageState>>,
}

impl FakePage {
    /// A page with `user_id` signed in.
    pub fn signed_in(user_id: &str) -> Self {
        Self::with_state(PageState {
            marker: Some(format!("{user_id}@example.com")),
            has_context: true,
            user_id: Some(Value::String(user_id.to_string())),
            ..PageState::default()
        })
    }

    /// A page that describes an anonymous visitor.
    pub fn anonymous() -> Self {
        Self::with_state(PageState {
            marker: Some(String::new()),
            has_context: true,
            ..PageState::default()
        })
    }

    /// A page that has no user context at all.
    pub fn without_context() -> Self {
        Self::default()
    }

    fn with_state(state: PageState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Every script injected so far, oldest first.
    pub fn injected(&self) -> Vec<String> {
        self.state.borrow().injected.clone()
    }

    /// Removes and returns everything posted to the window so far.
    pub fn take_posts(&self) -> Vec<Value> {
        std::mem::take(&mut self.state.borrow_mut().posts)
    }
}

impl Injector for FakePage {
    fn inject(&self, code: &str) -> Result<(), ContentError> {
        let mut state = self.state.borrow_mut();
        state.injected.push(code.to_string());

        let is_initial = if code.contains("isInitial: true") {
            true
        } else if code.contains("isInitial: false") {
            false
        } else {
            return Ok(());
        };

        let signed_in = state.has_context && state.marker.as_deref().is_some_and(|m| !m.is_empty());
        if !signed_in {
            return Ok(());
        }

        let mut post = Map::new();
        post.insert("isInitial".to_string(), Value::Bool(is_initial));
        if let Some(user_id) = state.user_id.clone() {
            post.insert("userId".to_string(), user_id);
        }
        post.insert("tier".to_string(), json!(1));
        post.insert("gaiaId".to_string(), json!("gaia-1"));
        post.insert("xt".to_string(), json!("xt-token"));

        state.posts.push(Value::Object(post));
        Ok(())
    }
}

/// A [BackgroundPort] that remembers every message it was handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackground {
    messages: Rc<RefCell<Vec<IdentityMessage>>>,
    failing: bool,
}

impl RecordingBackground {
    /// A port whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Everything delivered so far, oldest first.
    pub fn messages(&self) -> Vec<IdentityMessage> {
        self.messages.borrow().clone()
    }
}

impl BackgroundPort for RecordingBackground {
    fn send(&self, message: &IdentityMessage) -> Result<(), ContentError> {
        if self.failing {
            return Err(ContentError::Background(
                "receiving end does not exist".to_string(),
            ));
        }
        self.messages.borrow_mut().push(message.clone());
        Ok(())
    }
}
