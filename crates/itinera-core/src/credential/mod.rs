//! Bearer credentials for the speech service.
//!
//! A [`TokenSource`] performs one signed acquisition. A [`CredentialCache`]
//! wraps a source and hands out the cached value until it comes within a
//! safety margin of expiry. Refresh is single-flight: the slot lock is held
//! across the check and the acquisition, so concurrent callers near expiry
//! wait for one refresh instead of each issuing their own.

pub mod nls;
pub mod sign;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

pub use nls::{NlsConfig, NlsTokenSource};
pub use sign::SignedRequest;

/// Default safety margin subtracted from every issued expiry, in seconds.
pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 3600;

/// Errors from credential acquisition.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialError {
    #[error("speech credentials are not configured")]
    NotConfigured,

    #[error("credential acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("request signing failed: {0}")]
    Signature(String),
}

/// A token as issued by the endpoint, with its real expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// One credential acquisition, e.g. a signed HTTP request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire(&self) -> Result<IssuedToken, CredentialError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn TokenSource) {}
};

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for std::sync::Arc<T> {
    async fn acquire(&self) -> Result<IssuedToken, CredentialError> {
        (**self).acquire().await
    }
}

/// The cached credential. `expires_at` already has the safety margin taken
/// off, so the value is usable while `now < expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCredential {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedCredential {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Process-scoped credential slot with single-flight refresh.
///
/// The slot starts empty. The only transition is a refresh, which replaces
/// the whole value; a failed refresh leaves the previous value in place.
pub struct CredentialCache<S> {
    source: S,
    safety_margin: TimeDelta,
    slot: Mutex<Option<CachedCredential>>,
}

impl<S: TokenSource> CredentialCache<S> {
    /// A cache with the default one-hour safety margin.
    pub fn new(source: S) -> Self {
        Self::with_safety_margin(source, TimeDelta::seconds(DEFAULT_SAFETY_MARGIN_SECS))
    }

    pub fn with_safety_margin(source: S, safety_margin: TimeDelta) -> Self {
        Self {
            source,
            safety_margin,
            slot: Mutex::new(None),
        }
    }

    /// Return a usable credential, refreshing it first if needed.
    pub async fn get(&self) -> Result<String, CredentialError> {
        let mut slot = self.slot.lock().await;
        let now = Utc::now();

        if let Some(cached) = slot.as_ref().filter(|c| c.is_fresh(now)) {
            tracing::trace!(expires_at = %cached.expires_at, "using cached speech credential");
            return Ok(cached.value.clone());
        }

        tracing::debug!(had_value = slot.is_some(), "refreshing speech credential");
        let issued = self.source.acquire().await.inspect_err(|e| {
            tracing::warn!(error = %e, "speech credential refresh failed");
        })?;

        let cached = CachedCredential {
            value: issued.value,
            expires_at: issued.expires_at - self.safety_margin,
        };
        if !cached.is_fresh(now) {
            tracing::warn!(
                issued_expiry = %issued.expires_at,
                margin_secs = self.safety_margin.num_seconds(),
                "issued credential expires within the safety margin"
            );
        } else {
            tracing::info!(usable_until = %cached.expires_at, "acquired speech credential");
        }

        let value = cached.value.clone();
        *slot = Some(cached);
        Ok(value)
    }

    /// Snapshot of the slot, for diagnostics.
    pub async fn cached(&self) -> Option<CachedCredential> {
        self.slot.lock().await.clone()
    }

    pub fn safety_margin(&self) -> TimeDelta {
        self.safety_margin
    }
}
