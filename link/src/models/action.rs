use serde::{Deserialize, Serialize};

/// Action carried by an outbound [`SubscriptionMessage`](super::SubscriptionMessage).
///
/// `Join`/`Subscribe` acquire server-side state; `Leave`/`Unsubscribe`
/// release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Enter a channel room.
    Join,
    /// Start receiving updates for a set of keys.
    Subscribe,
    /// Stop receiving updates for a set of keys.
    Unsubscribe,
    /// Leave a channel room.
    Leave,
}

impl Action {
    /// `true` for actions that create a server-side subscription.
    pub fn is_acquire(self) -> bool {
        matches!(self, Action::Join | Action::Subscribe)
    }

    /// The action that undoes this one (`join` ↔ `leave`, `subscribe` ↔ `unsubscribe`).
    pub fn counterpart(self) -> Action {
        match self {
            Action::Join => Action::Leave,
            Action::Subscribe => Action::Unsubscribe,
            Action::Unsubscribe => Action::Subscribe,
            Action::Leave => Action::Join,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Join => "join",
            Action::Subscribe => "subscribe",
            Action::Unsubscribe => "unsubscribe",
            Action::Leave => "leave",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
