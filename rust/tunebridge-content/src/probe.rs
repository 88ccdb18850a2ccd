use serde::Deserialize;
use serde_json::Value;

/// Where the page keeps the signed-in user's identity.
///
/// The identity lives in page globals that the content script cannot read
/// directly; [ProbeConfig::render] produces a script that reads them from
/// inside the page and posts them back to the window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProbeConfig {
    /// Global array describing the signed-in user
    pub context_global: String,
    /// Index of the field that is non-empty only for signed-in users
    pub marker_index: u32,
    /// Index of the account tier
    pub tier_index: u32,
    /// Index of the account's global identifier
    pub account_index: u32,
    /// Global holding the user id
    pub user_id_global: String,
    /// Global function that reads a cookie by name
    pub cookie_reader: String,
    /// Cookie holding the session token
    pub token_cookie: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            context_global: "USER_CONTEXT".to_string(),
            marker_index: 12,
            tier_index: 13,
            account_index: 32,
            user_id_global: "USER_ID".to_string(),
            cookie_reader: "_GU_getCookie".to_string(),
            token_cookie: "xt".to_string(),
        }
    }
}

impl ProbeConfig {
    /// Renders the probe. `initial` is embedded as a literal so the answer
    /// can be told apart from the answer to a later refresh.
    ///
    /// The probe posts exactly one message when the page has a signed-in
    /// user and nothing otherwise, including when the context global is
    /// missing altogether.
    pub fn render(&self, initial: bool) -> String {
        let context = quote(&self.context_global);
        let user_id = quote(&self.user_id_global);
        let reader = quote(&self.cookie_reader);
        let cookie = quote(&self.token_cookie);
        let marker = self.marker_index;
        let tier = self.tier_index;
        let account = self.account_index;

        format!(
            r#"(function () {{
  var context = window[{context}];
  if (!context || context[{marker}] == null || context[{marker}] === '') {{
    return;
  }}
  var readCookie = window[{reader}];
  window.postMessage({{
    isInitial: {initial},
    userId: window[{user_id}],
    tier: context[{tier}],
    gaiaId: context[{account}],
    xt: typeof readCookie === 'function' ? readCookie({cookie}) : undefined
  }}, '*');
}})();"#
        )
    }
}

/// Embeds `text` as a JavaScript string literal.
fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
