//! Channel-level consumers of a shared connection.

pub mod binding;
pub mod ledger;

pub use binding::{BindingSender, ChannelBinding, ChannelBindingBuilder};
pub use ledger::SubscriptionLedger;
