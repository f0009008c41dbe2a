//! Client-held interest set shared with a feed.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;

/// The opaque keys that should currently be subscribed.
///
/// Clones share one set. Every effective mutation wakes the feeds watching
/// it; no-op mutations do not.
#[derive(Debug, Clone)]
pub struct InterestSet {
    tx: Arc<watch::Sender<BTreeSet<String>>>,
}

impl Default for InterestSet {
    fn default() -> Self {
        Self::new()
    }
}

impl InterestSet {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(BTreeSet::new());
        Self { tx: Arc::new(tx) }
    }

    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = Self::new();
        set.replace(keys);
        set
    }

    pub fn insert(&self, key: impl Into<String>) -> bool {
        let key = key.into();
        self.tx.send_if_modified(|keys| keys.insert(key))
    }

    pub fn remove(&self, key: &str) -> bool {
        self.tx.send_if_modified(|keys| keys.remove(key))
    }

    /// Swap in a whole new snapshot (e.g. a refreshed account list).
    pub fn replace<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        self.tx.send_if_modified(|keys| {
            if *keys == next {
                false
            } else {
                *keys = next;
                true
            }
        });
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|keys| {
            let changed = !keys.is_empty();
            keys.clear();
            changed
        });
    }

    pub fn snapshot(&self) -> BTreeSet<String> {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<String>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations() {
        let interest = InterestSet::from_keys(["alice", "bob"]);
        assert!(interest.insert("carol"));
        assert!(!interest.insert("carol"));
        assert!(interest.remove("alice"));
        assert!(!interest.remove("alice"));
        assert_eq!(
            interest.snapshot().into_iter().collect::<Vec<_>>(),
            vec!["bob", "carol"]
        );
    }

    #[tokio::test]
    async fn test_noop_replace_does_not_notify() {
        let interest = InterestSet::from_keys(["alice"]);
        let mut rx = interest.subscribe();

        interest.replace(["alice"]);
        assert!(!rx.has_changed().unwrap());

        interest.replace(["bob"]);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().contains("bob"));
    }
}
