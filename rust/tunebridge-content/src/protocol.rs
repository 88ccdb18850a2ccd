//! Shapes of every message that crosses an isolation boundary.
//!
//! - [Request] / [Response]: background process → content script and back.
//! - [PageAnnouncement]: injected probe (page world) → content script.
//! - [IdentityMessage]: content script → background process.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tunebridge_store::QueryResult;

use crate::ContentError;

/// The literal the content script acknowledges a token refresh with.
pub const ACK: &str = "ok";

/// A request sent by the background process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    /// Read the page's cached tracks
    #[serde(rename = "getLocalTracks")]
    GetLocalTracks,
    /// Re-run the identity probe so a fresh session token is announced
    #[serde(rename = "getXsrf")]
    GetXsrf,
    /// Any other action; never answered
    #[serde(other)]
    Unknown,
}

/// The answer to a [Request].
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The outcome of [Request::GetLocalTracks]; `None` serializes as `null`
    Tracks(Option<QueryResult>),
    /// The acknowledgement of [Request::GetXsrf], serialized as `"ok"`
    Ack,
}

impl Response {
    /// Encodes the response as JSON text.
    pub fn to_json(&self) -> Result<String, ContentError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Response::Tracks(result) => result.serialize(serializer),
            Response::Ack => serializer.serialize_str(ACK),
        }
    }
}

/// What the injected probe posts to the page's window.
///
/// `isInitial` is mandatory; anything posted to the window without it is not
/// an announcement. Every other field is opaque page data, kept as found:
/// a field that is absent stays `None` while an explicit `null` becomes
/// `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnnouncement {
    /// Whether this answers the probe injected at load time
    pub is_initial: bool,
    /// The page's user id
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    /// The account tier
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tier: Option<Value>,
    /// The account's global identifier
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub gaia_id: Option<Value>,
    /// The session (XSRF) token
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub xt: Option<Value>,
}

impl PageAnnouncement {
    /// Decodes an announcement out of whatever was posted to the window.
    pub fn from_value(data: &Value) -> Result<Self, ContentError> {
        Ok(PageAnnouncement::deserialize(data)?)
    }

    /// The user id as the background process expects it: converted to text
    /// the way a template string would, so a missing id reads `"undefined"`
    /// and a `null` one reads `"null"`.
    pub fn user_id_text(&self) -> String {
        match &self.user_id {
            Some(value) => js_string(value),
            None => "undefined".to_string(),
        }
    }

    /// The user id to name the track database after, when the page actually
    /// provided one.
    pub fn session_user_id(&self) -> Option<String> {
        match &self.user_id {
            None | Some(Value::Null) => None,
            Some(value) => Some(js_string(value)),
        }
    }
}

/// Which background behavior an [IdentityMessage] triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityAction {
    /// Sent once per page load: show the extension's page action
    ShowPageAction,
    /// Sent after every on-demand refresh: store the new session token
    SetXsrf,
}

impl IdentityAction {
    /// The action an announcement maps to.
    pub fn for_announcement(is_initial: bool) -> Self {
        if is_initial {
            IdentityAction::ShowPageAction
        } else {
            IdentityAction::SetXsrf
        }
    }
}

/// Identity and session data forwarded to the background process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityMessage {
    /// What the background process should do with it
    pub action: IdentityAction,
    /// The account tier, as the page reported it
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tier: Option<Value>,
    /// The session token, as the page reported it
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub xt: Option<Value>,
    /// The account's global identifier, as the page reported it
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub gaia_id: Option<Value>,
    /// The user id, always as text
    pub user_id: String,
    /// The multi-login index from the page URL; `null` when unparsable
    pub user_index: Option<i64>,
}

impl IdentityMessage {
    /// Builds the message forwarded for `announcement`.
    pub fn forward(announcement: &PageAnnouncement, user_index: Option<i64>) -> Self {
        Self {
            action: IdentityAction::for_announcement(announcement.is_initial),
            tier: announcement.tier.clone(),
            xt: announcement.xt.clone(),
            gaia_id: announcement.gaia_id.clone(),
            user_id: announcement.user_id_text(),
            user_index,
        }
    }
}

/// Keeps an explicit `null` distinct from a missing field.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Converts a JSON value to text the way JavaScript's `String()` does.
fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float)
                if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e21 =>
            {
                format!("{float:.0}")
            }
            _ => number.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                item => js_string(item),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}
