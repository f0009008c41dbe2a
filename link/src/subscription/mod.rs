//! Interest-set driven subscriptions.
//!
//! - [`differ`]: pure set diff into subscribe/unsubscribe messages
//! - [`interest`]: the shared, watchable interest set
//! - [`feed`]: the task tying both to a [`ChannelBinding`](crate::ChannelBinding)

pub mod differ;
pub mod feed;
pub mod interest;

pub use differ::{ChannelShape, InterestDelta, SubscriptionDiffer};
pub use feed::{MonitorFeed, MonitorFeedBuilder};
pub use interest::InterestSet;
