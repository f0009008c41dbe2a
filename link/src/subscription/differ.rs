//! Minimal subscribe/unsubscribe deltas between interest-set snapshots.

use std::collections::BTreeSet;

use crate::models::{Action, PayloadKind, SubscriptionMessage};

/// Keys to acquire and release to move the server from the previous
/// snapshot to the current one. Both lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl InterestDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// One `unsubscribe` (for removed keys) then one `subscribe` (for added
    /// keys) per channel shape.
    pub fn messages(&self, shapes: &[ChannelShape], credential: &str) -> Vec<SubscriptionMessage> {
        let mut messages = Vec::new();
        for shape in shapes {
            if !self.removed.is_empty() {
                messages.push(shape.message(Action::Unsubscribe, credential, self.removed.clone()));
            }
            if !self.added.is_empty() {
                messages.push(shape.message(Action::Subscribe, credential, self.added.clone()));
            }
        }
        messages
    }
}

/// A channel and the payload field its keys travel in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelShape {
    pub channel: String,
    pub kind: PayloadKind,
}

impl ChannelShape {
    pub fn new(channel: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            channel: channel.into(),
            kind,
        }
    }

    pub fn message(&self, action: Action, credential: &str, keys: Vec<String>) -> SubscriptionMessage {
        SubscriptionMessage::keyed(self.channel.clone(), action, credential, self.kind, keys)
    }
}

/// Tracks the key set last pushed to the server.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionDiffer {
    tracked: BTreeSet<String>,
}

impl SubscriptionDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently considered subscribed.
    pub fn tracked(&self) -> &BTreeSet<String> {
        &self.tracked
    }

    /// `true` when `current` matches the tracked set.
    pub fn is_current(&self, current: &BTreeSet<String>) -> bool {
        self.tracked == *current
    }

    /// Diff `current` against the tracked set and adopt it as the new baseline.
    pub fn apply(&mut self, current: &BTreeSet<String>) -> InterestDelta {
        let added = current.difference(&self.tracked).cloned().collect();
        let removed = self.tracked.difference(current).cloned().collect();
        self.tracked = current.clone();
        InterestDelta { added, removed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_first_apply_adds_everything() {
        let mut differ = SubscriptionDiffer::new();
        let delta = differ.apply(&set(&["bob", "alice"]));
        assert_eq!(delta.added, vec!["alice", "bob"]);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_alice_bob_to_bob_carol() {
        let mut differ = SubscriptionDiffer::new();
        differ.apply(&set(&["alice", "bob"]));
        let delta = differ.apply(&set(&["bob", "carol"]));

        assert_eq!(delta.added, vec!["carol"]);
        assert_eq!(delta.removed, vec!["alice"]);
        assert_eq!(differ.tracked(), &set(&["bob", "carol"]));
    }

    #[test]
    fn test_unchanged_set_is_empty_delta() {
        let mut differ = SubscriptionDiffer::new();
        differ.apply(&set(&["alice"]));
        assert!(differ.is_current(&set(&["alice"])));
        assert!(differ.apply(&set(&["alice"])).is_empty());
    }

    #[test]
    fn test_messages_per_shape() {
        let delta = InterestDelta {
            added: vec!["carol".into()],
            removed: vec!["alice".into()],
        };
        let shapes = [
            ChannelShape::new("twitter", PayloadKind::Usernames),
            ChannelShape::new("telegram", PayloadKind::Groups),
        ];
        let messages = delta.messages(&shapes, "cred");

        assert_eq!(messages.len(), 4);
        assert_eq!(
            messages[0].to_json().unwrap(),
            r#"{"channel":"twitter","action":"unsubscribe","credential":"cred","usernames":["alice"]}"#
        );
        assert_eq!(
            messages[3].to_json().unwrap(),
            r#"{"channel":"telegram","action":"subscribe","credential":"cred","groups":["carol"]}"#
        );
    }
}
