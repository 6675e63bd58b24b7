//! Session token creation and verification.
//!
//! A session credential is an HS256-signed JWT carrying the owning email and a
//! 30-day expiration claim, so tampered or expired tokens are rejected without
//! touching the store. Every session is additionally persisted server-side so
//! logout and account deletion can revoke it; both checks must pass.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::Error;
use crate::kv::{self, keys, KvStore};

/// Sessions live for 30 days.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// JWT session claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String, // Subject (user email)
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Owns Session persistence and the signing secret.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    secret: String,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>, secret: impl Into<String>) -> Self {
        Self { kv, secret: secret.into() }
    }

    /// Issues a signed session token for `email` and persists the matching
    /// revocation record with a 30-day store expiry.
    pub async fn create(&self, email: &str) -> Result<String, Error> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(SESSION_TTL).unwrap_or_default();

        let claims = SessionClaims {
            sub: email.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let key = EncodingKey::from_secret(self.secret.as_bytes());
        let token = encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
            operation: format!("create session token: {e}"),
        })?;

        let record = SessionRecord {
            email: email.to_string(),
            created_at: now,
            expires_at,
        };
        kv::set_typed(self.kv.as_ref(), &[keys::SESSION, &token], &record, Some(SESSION_TTL)).await?;

        Ok(token)
    }

    /// Resolves a session token to its record.
    ///
    /// The signature and expiration claim are verified first - tampered or
    /// expired tokens are rejected without a store lookup. The persisted record
    /// must then still exist and be unexpired; a missing record means the
    /// session was revoked. Store faults yield `None` (fail closed).
    pub async fn get(&self, token: &str) -> Option<SessionRecord> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let claims = match decode::<SessionClaims>(token, &key, &Validation::default()) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("session token rejected: {e}");
                return None;
            }
        };
        if claims.sub.is_empty() {
            return None;
        }

        let store_key = [keys::SESSION, token];
        let record: SessionRecord = match kv::get_typed(self.kv.as_ref(), &store_key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!("session lookup failed, treating session as invalid: {e}");
                return None;
            }
        };

        if record.expires_at < Utc::now() {
            if let Err(e) = self.kv.delete(&store_key).await {
                warn!("failed to delete expired session: {e}");
            }
            return None;
        }

        Some(record)
    }

    /// Removes the persisted session record. Idempotent.
    pub async fn delete(&self, token: &str) {
        if let Err(e) = self.kv.delete(&[keys::SESSION, token]).await {
            warn!("failed to delete session: {e}");
        }
    }
}

/// Cookie header value establishing the session.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_TTL.as_secs()
    )
}

/// Cookie header value clearing the session.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0")
}

/// Extracts the session token from a `Cookie` request header value.
pub fn token_from_cookie_header(cookie_header: &str) -> Option<String> {
    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=') {
            if name == SESSION_COOKIE {
                return Some(value.to_string());
            }
        }
    }
    None
}
