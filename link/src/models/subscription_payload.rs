use serde::{Deserialize, Serialize};

/// Which payload field a channel expects its subscription keys under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Keys are sent as `usernames: [...]`.
    Usernames,
    /// Keys are sent as `groups: [...]`.
    Groups,
}

impl PayloadKind {
    /// Wrap `keys` in the payload variant for this kind.
    pub fn wrap(self, keys: Vec<String>) -> SubscriptionPayload {
        match self {
            PayloadKind::Usernames => SubscriptionPayload::Usernames(keys),
            PayloadKind::Groups => SubscriptionPayload::Groups(keys),
        }
    }
}

/// Key list attached to an outbound message.
///
/// Serialized flattened into the parent message, so on the wire it appears as
/// a top-level `usernames` or `groups` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPayload {
    /// Account names (social feeds).
    Usernames(Vec<String>),
    /// Group names, channel ids or signatures.
    Groups(Vec<String>),
}

impl SubscriptionPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            SubscriptionPayload::Usernames(_) => PayloadKind::Usernames,
            SubscriptionPayload::Groups(_) => PayloadKind::Groups,
        }
    }

    pub fn keys(&self) -> &[String] {
        match self {
            SubscriptionPayload::Usernames(keys) | SubscriptionPayload::Groups(keys) => keys,
        }
    }

    pub(crate) fn keys_mut(&mut self) -> &mut Vec<String> {
        match self {
            SubscriptionPayload::Usernames(keys) | SubscriptionPayload::Groups(keys) => keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }
}
