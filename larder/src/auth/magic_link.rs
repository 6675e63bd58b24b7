//! One-time, time-boxed magic-link tokens.

use chrono::{DateTime, Utc};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::errors::Error;
use crate::kv::{self, keys, KvStore};

/// Magic links expire 15 minutes after creation.
pub const MAGIC_LINK_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLinkRecord {
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Generates an opaque token with 256 bits of cryptographically secure
/// randomness, hex-encoded (64 characters).
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Owns MagicLinkToken persistence. Tokens are keyed by their value and deleted
/// on first successful verification or on expiry detection, whichever first.
#[derive(Clone)]
pub struct MagicLinkStore {
    kv: Arc<dyn KvStore>,
}

impl MagicLinkStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Creates a magic-link token for `email` and returns the raw token for
    /// embedding in a URL.
    pub async fn create(&self, email: &str) -> Result<String, Error> {
        let token = generate_token();
        let now = Utc::now();

        let record = MagicLinkRecord {
            email: email.to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(MAGIC_LINK_TTL).unwrap_or_default(),
        };

        kv::set_typed(self.kv.as_ref(), &[keys::MAGIC_LINK, &token], &record, Some(MAGIC_LINK_TTL)).await?;

        Ok(token)
    }

    /// Verifies a magic-link token, consuming it on success.
    ///
    /// Returns `None` for unknown tokens (covers both "never existed" and
    /// "already consumed" - callers cannot distinguish the two), for expired
    /// tokens (deleted on detection), and for any store fault (fail closed).
    /// The record is deleted before the email is returned, so a token is
    /// accepted at most once.
    pub async fn verify(&self, token: &str) -> Option<String> {
        let key = [keys::MAGIC_LINK, token];

        let record: MagicLinkRecord = match kv::get_typed(self.kv.as_ref(), &key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!("magic link lookup failed, treating token as invalid: {e}");
                return None;
            }
        };

        if record.expires_at < Utc::now() {
            if let Err(e) = self.kv.delete(&key).await {
                warn!("failed to delete expired magic link: {e}");
            }
            return None;
        }

        // Single use: the delete must land before we report success
        if let Err(e) = self.kv.delete(&key).await {
            warn!("failed to consume magic link, treating token as invalid: {e}");
            return None;
        }

        Some(record.email)
    }
}

/// Builds the verification URL embedded in the login email.
pub fn magic_link_url(base_url: &str, token: &str) -> String {
    format!("{}/api/auth/verify?token={}", base_url.trim_end_matches('/'), token)
}
