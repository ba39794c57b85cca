//! Access token cache for Firestore requests.
//!
//! Tokens are refreshed a minute before expiry. Refresh happens under the
//! write lock so concurrent callers wait for one refresh instead of racing.
//! If a refresh fails while the previous token has not yet expired, the
//! previous token keeps being served.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// How long before expiry a token is considered stale.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the provider reports an unusable expiry.
const FALLBACK_LIFETIME: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for the Firestore REST API.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct Entry {
    token: String,
    expires_at: Instant,
}

impl Entry {
    fn fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }

    fn alive(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared bearer-token cache.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    entry: RwLock<Option<Entry>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            entry: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        self.entry.write().await.take();
    }

    /// Return a bearer token, fetching a new one when the cached one is stale.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        if let Some(entry) = self.entry.read().await.as_ref() {
            if entry.fresh(Instant::now()) {
                return Ok(entry.token.clone());
            }
        }

        let mut slot = self.entry.write().await;
        if let Some(entry) = slot.as_ref() {
            if entry.fresh(Instant::now()) {
                return Ok(entry.token.clone());
            }
        }

        match self.provider.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let lifetime = lifetime_until(token.expires_at());
                let value = token.as_str().to_string();
                *slot = Some(Entry {
                    token: value.clone(),
                    expires_at: Instant::now() + lifetime,
                });
                debug!(lifetime_secs = lifetime.as_secs(), "Refreshed Firestore access token");
                Ok(value)
            }
            Err(e) => match slot.as_ref() {
                Some(entry) if entry.alive(Instant::now()) => {
                    warn!(error = %e, "Token refresh failed, serving previous token");
                    Ok(entry.token.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}

/// Remaining lifetime of a token expiring at `expires_at`.
fn lifetime_until(expires_at: chrono::DateTime<Utc>) -> Duration {
    let remaining = expires_at - Utc::now();
    if remaining <= chrono::Duration::zero() {
        return Duration::ZERO;
    }
    remaining.to_std().unwrap_or(FALLBACK_LIFETIME)
}
