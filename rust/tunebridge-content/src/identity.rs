use serde_json::Value;

use crate::{
    BackgroundPort, ContentError, IdentityMessage, Injector, PageAnnouncement, ProbeConfig,
    UserSession,
};

/// Who posted a message to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// The window the content script runs in (where the probe posts)
    OwnWindow,
    /// A frame, another window, or no window at all
    Foreign,
}

/// Carries the signed-in user's identity from the page world to the
/// background process.
///
/// [IdentityRelay::announce] and [IdentityRelay::refresh_token] only inject
/// the probe; its answer arrives later as a window message that the browser
/// glue hands to [IdentityRelay::receive]. No timeout is imposed on that
/// answer, and a page without a signed-in user never sends one.
pub struct IdentityRelay<I, B> {
    injector: I,
    background: B,
    probe: ProbeConfig,
    session: UserSession,
    user_index: Option<i64>,
}

impl<I, B> IdentityRelay<I, B>
where
    I: Injector,
    B: BackgroundPort,
{
    /// Creates a relay that caches announced user ids in `session` and
    /// reports `user_index` as the page's multi-login index.
    pub fn new(injector: I, background: B, session: UserSession, user_index: Option<i64>) -> Self {
        Self {
            injector,
            background,
            probe: ProbeConfig::default(),
            session,
            user_index,
        }
    }

    /// Replaces the probe configuration.
    pub fn with_probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    /// Probes the page once at load time.
    pub fn announce(&self) -> Result<(), ContentError> {
        tracing::debug!("probing page for the signed-in user");
        self.injector.inject(&self.probe.render(true))
    }

    /// Probes the page again so that a fresh session token is forwarded.
    pub fn refresh_token(&self) -> Result<(), ContentError> {
        tracing::debug!("probing page for a fresh session token");
        self.injector.inject(&self.probe.render(false))
    }

    /// Handles a message posted to the window.
    ///
    /// Messages from any other source, and anything that is not a probe
    /// announcement, are dropped. Returns the forwarded message, if any.
    pub fn receive(
        &self,
        source: MessageSource,
        data: &Value,
    ) -> Result<Option<IdentityMessage>, ContentError> {
        if source != MessageSource::OwnWindow {
            tracing::debug!("ignoring message from a foreign source");
            return Ok(None);
        }

        let announcement = match PageAnnouncement::from_value(data) {
            Ok(announcement) => announcement,
            Err(error) => {
                tracing::debug!(%error, "ignoring window message that is not an announcement");
                return Ok(None);
            }
        };

        if let Some(user_id) = announcement.session_user_id() {
            self.session.set_user_id(user_id);
        }

        let message = IdentityMessage::forward(&announcement, self.user_index);
        tracing::debug!(action = ?message.action, "forwarding identity to background");
        self.background.send(&message)?;

        Ok(Some(message))
    }
}
