//! Net record of the join/subscribe messages a binding has sent.
//!
//! Every acquire (`join`/`subscribe`) is kept until a release
//! (`leave`/`unsubscribe`) covers it, so teardown and rejoin replay exactly
//! what the server still holds for us.

use crate::models::{Action, PayloadKind, SubscriptionMessage};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionLedger {
    entries: Vec<SubscriptionMessage>,
}

fn same_slot(entry: &SubscriptionMessage, channel: &str, action: Action, kind: Option<PayloadKind>) -> bool {
    entry.channel == channel && entry.action == action && entry.payload_kind() == kind
}

impl SubscriptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live acquire messages, in the order they were recorded.
    pub fn entries(&self) -> &[SubscriptionMessage] {
        &self.entries
    }

    /// Every live key acquired on `channel` with the given payload kind.
    pub fn live_keys(&self, channel: &str, kind: PayloadKind) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.channel == channel && e.payload_kind() == Some(kind))
            .flat_map(|e| e.keys().iter().cloned())
            .collect()
    }

    /// Account for a message that was (or is about to be) sent.
    pub fn record(&mut self, message: &SubscriptionMessage) {
        if message.action.is_acquire() {
            self.acquire(message);
        } else {
            self.release(message);
        }
    }

    fn acquire(&mut self, message: &SubscriptionMessage) {
        let kind = message.payload_kind();
        if kind.is_none() {
            // An unkeyed acquire of a slot we already hold only refreshes it.
            self.entries
                .retain(|e| !same_slot(e, &message.channel, message.action, None));
        } else {
            if message.keys().is_empty() {
                return;
            }
            self.strip(&message.channel, message.action, kind, message.keys());
        }
        self.entries.push(message.clone());
    }

    fn release(&mut self, message: &SubscriptionMessage) {
        let acquired = message.action.counterpart();
        match message.payload_kind() {
            None => self.entries.retain(|e| !(e.channel == message.channel && e.action == acquired)),
            kind => self.strip(&message.channel, acquired, kind, message.keys()),
        }
    }

    /// Remove `keys` from keyed entries in the slot, dropping emptied entries.
    fn strip(&mut self, channel: &str, action: Action, kind: Option<PayloadKind>, keys: &[String]) {
        for entry in self.entries.iter_mut() {
            if !same_slot(entry, channel, action, kind) {
                continue;
            }
            if let Some(payload) = entry.payload.as_mut() {
                payload.keys_mut().retain(|k| !keys.contains(k));
            }
        }
        self.entries.retain(|e| e.payload.as_ref().map_or(true, |p| !p.is_empty()));
    }

    /// Merge the entries of each (channel, action, kind) slot into one
    /// message carrying the union of their keys and the newest credential.
    pub fn compact(&mut self) {
        let mut merged: Vec<SubscriptionMessage> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            let slot = merged
                .iter_mut()
                .find(|m| same_slot(m, &entry.channel, entry.action, entry.payload_kind()));
            match slot {
                Some(existing) => {
                    existing.credential = entry.credential;
                    if let (Some(into), Some(from)) = (existing.payload.as_mut(), entry.payload) {
                        into.keys_mut().extend(from.keys().iter().cloned());
                    }
                },
                None => merged.push(entry),
            }
        }
        self.entries = merged;
    }

    /// Compacted copy of the live entries, for a rejoin.
    pub fn replay(&mut self) -> Vec<SubscriptionMessage> {
        self.compact();
        self.entries.clone()
    }

    /// Drain the ledger into release counterparts, newest first.
    pub fn teardown(&mut self) -> Vec<SubscriptionMessage> {
        self.entries.drain(..).rev().map(|e| e.counterpart()).collect()
    }
}
