//! Credential handling for outbound subscription messages.
//!
//! Every outbound [`SubscriptionMessage`](crate::SubscriptionMessage) embeds an
//! opaque credential (license key or token). Issuance is somebody else's job;
//! this module only decides where the current value comes from.

mod provider;

pub use provider::{ArcCredentialProvider, CredentialProvider, ResolvedCredential};
