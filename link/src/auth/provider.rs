//! Credential providers.
//!
//! ## Dynamic provider
//!
//! Use [`CredentialProvider`] to supply the credential lazily. It is called
//! once per subscription update cycle and on every resubscription after a
//! reconnect, so rotated tokens are picked up without rebuilding the feed.
//!
//! ```rust,no_run
//! use feed_link::CredentialProvider;
//!
//! struct LicenseStore { /* ... */ }
//!
//! #[async_trait::async_trait]
//! impl CredentialProvider for LicenseStore {
//!     async fn credential(&self) -> feed_link::Result<String> {
//!         // read / refresh the license here
//!         Ok("fresh-license".to_string())
//!     }
//! }
//! ```

use crate::error::Result;
use std::sync::Arc;

/// Async credential source called before building outbound messages.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Return the current (or freshly refreshed) credential.
    async fn credential(&self) -> Result<String>;
}

/// A boxed, reference-counted [`CredentialProvider`].
pub type ArcCredentialProvider = Arc<dyn CredentialProvider>;

/// Resolves the effective credential for a feed.
///
/// Holds either a static credential or a dynamic provider. Call [`resolve`]
/// before each update cycle to obtain the value to embed.
///
/// [`resolve`]: ResolvedCredential::resolve
#[derive(Clone)]
pub enum ResolvedCredential {
    /// Fixed credential set at construction time.
    Static(String),
    /// Provider called on every update cycle.
    Dynamic(ArcCredentialProvider),
}

impl ResolvedCredential {
    /// Obtain the credential, calling the dynamic provider if present.
    pub async fn resolve(&self) -> Result<String> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Dynamic(provider) => provider.credential().await,
        }
    }

    /// `true` for an empty static credential.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Static(value) if value.is_empty())
    }
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(value) if value.is_empty() => write!(f, "ResolvedCredential::Static(<empty>)"),
            Self::Static(_) => write!(f, "ResolvedCredential::Static(<redacted>)"),
            Self::Dynamic(_) => write!(f, "ResolvedCredential::Dynamic(<fn>)"),
        }
    }
}

impl Default for ResolvedCredential {
    fn default() -> Self {
        Self::Static(String::new())
    }
}

impl From<String> for ResolvedCredential {
    fn from(value: String) -> Self {
        Self::Static(value)
    }
}

impl From<&str> for ResolvedCredential {
    fn from(value: &str) -> Self {
        Self::Static(value.to_string())
    }
}

impl From<ArcCredentialProvider> for ResolvedCredential {
    fn from(provider: ArcCredentialProvider) -> Self {
        Self::Dynamic(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedLinkError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct RotatingToken {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl CredentialProvider for RotatingToken {
        async fn credential(&self) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{}", n))
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl CredentialProvider for Broken {
        async fn credential(&self) -> Result<String> {
            Err(FeedLinkError::AuthenticationError("license expired".into()))
        }
    }

    #[tokio::test]
    async fn test_static_credential_resolves_to_itself() {
        let cred = ResolvedCredential::from("abc");
        assert_eq!(cred.resolve().await.unwrap(), "abc");
        assert!(!cred.is_empty());
        assert!(ResolvedCredential::default().is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_credential_called_each_time() {
        let provider: ArcCredentialProvider = Arc::new(RotatingToken {
            calls: AtomicU32::new(0),
        });
        let cred = ResolvedCredential::from(provider);
        assert_eq!(cred.resolve().await.unwrap(), "token-0");
        assert_eq!(cred.resolve().await.unwrap(), "token-1");
    }

    #[tokio::test]
    async fn test_dynamic_credential_error_propagates() {
        let provider: ArcCredentialProvider = Arc::new(Broken);
        let err = ResolvedCredential::from(provider).resolve().await.unwrap_err();
        assert!(matches!(err, FeedLinkError::AuthenticationError(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let dbg = format!("{:?}", ResolvedCredential::from("super-secret"));
        assert!(!dbg.contains("super-secret"));
    }
}
