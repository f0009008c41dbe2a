use serde::{Deserialize, Serialize};

use super::action::Action;
use super::subscription_payload::{PayloadKind, SubscriptionPayload};

/// Client-to-server subscription control message.
///
/// Wire form:
///
/// ```json
/// {"channel":"twitter","action":"subscribe","credential":"…","usernames":["alice"]}
/// ```
///
/// # Example
///
/// ```rust
/// use feed_link::{Action, PayloadKind, SubscriptionMessage};
///
/// let msg = SubscriptionMessage::new("twitter", Action::Subscribe, "token")
///     .with_payload(PayloadKind::Usernames.wrap(vec!["alice".into()]));
/// assert_eq!(msg.counterpart().action, Action::Unsubscribe);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    /// Logical channel (room) name.
    pub channel: String,
    /// What the server should do.
    pub action: Action,
    /// Opaque credential (license/token) supplied by a collaborator.
    pub credential: String,
    /// Optional key list; absent for plain room joins.
    #[serde(flatten)]
    pub payload: Option<SubscriptionPayload>,
}

impl SubscriptionMessage {
    pub fn new(channel: impl Into<String>, action: Action, credential: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            action,
            credential: credential.into(),
            payload: None,
        }
    }

    /// Build a keyed message for `channel` using the payload field of `kind`.
    pub fn keyed(
        channel: impl Into<String>,
        action: Action,
        credential: impl Into<String>,
        kind: PayloadKind,
        keys: Vec<String>,
    ) -> Self {
        Self::new(channel, action, credential).with_payload(kind.wrap(keys))
    }

    pub fn with_payload(mut self, payload: SubscriptionPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Keys carried by this message (empty for unkeyed joins/leaves).
    pub fn keys(&self) -> &[String] {
        self.payload.as_ref().map(|p| p.keys()).unwrap_or(&[])
    }

    pub fn payload_kind(&self) -> Option<PayloadKind> {
        self.payload.as_ref().map(SubscriptionPayload::kind)
    }

    /// Clone of this message with the action replaced by its counterpart.
    pub fn counterpart(&self) -> Self {
        let mut msg = self.clone();
        msg.action = self.action.counterpart();
        msg
    }

    /// Serialize to the JSON text frame sent on the wire.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
