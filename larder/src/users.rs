//! User records and profile persistence.
//!
//! A user record is keyed by email and stores the pantry item list, the
//! free-text dietary preference, and an encrypted copy of the user's LLM API
//! key. The plaintext key never reaches the store and never leaves the server
//! in responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::crypto::SecretCipher;
use crate::errors::{Error, Result};
use crate::kv::{self, keys, KvStore};

/// The persisted shape of a user. Only ever serialized into the store; API
/// responses go through [`UserProfile`] so the encrypted key stays private.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub dietary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_encrypted: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A partial update against a [`UserRecord`]. `None` fields are left
/// untouched; `api_key_encrypted` distinguishes "leave alone" (`None`) from
/// "set" (`Some(Some(_))`) and "remove" (`Some(None)`).
#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub items: Option<Vec<String>>,
    pub dietary: Option<String>,
    pub api_key_encrypted: Option<Option<String>>,
}

/// The client-visible view of a user. The stored key is reduced to a
/// presence flag.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub email: String,
    pub items: Vec<String>,
    pub dietary: String,
    pub has_api_key: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            email: record.email.clone(),
            items: record.items.clone(),
            dietary: record.dietary.clone(),
            has_api_key: record.api_key_encrypted.is_some(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Owns user persistence and API key encryption.
#[derive(Clone)]
pub struct UserStore {
    kv: Arc<dyn KvStore>,
    cipher: SecretCipher,
}

impl UserStore {
    pub fn new(kv: Arc<dyn KvStore>, cipher: SecretCipher) -> Self {
        Self { kv, cipher }
    }

    pub async fn get(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(kv::get_typed(self.kv.as_ref(), &[keys::USER, email]).await?)
    }

    /// Creates an empty record for `email`.
    pub async fn create(&self, email: &str) -> Result<UserRecord> {
        let now = Utc::now();
        let record = UserRecord {
            email: email.to_string(),
            items: Vec::new(),
            dietary: String::new(),
            api_key_encrypted: None,
            created_at: now,
            updated_at: now,
        };
        self.persist(&record).await?;
        debug!(email, "created user record");
        Ok(record)
    }

    /// Fetches the user, creating an empty record on first sight.
    pub async fn get_or_create(&self, email: &str) -> Result<UserRecord> {
        match self.get(email).await? {
            Some(existing) => Ok(existing),
            None => self.create(email).await,
        }
    }

    /// Applies a partial update, returning the updated record or `None` when
    /// no record exists for `email`.
    ///
    /// `email` and `created_at` are immutable; `updated_at` strictly increases
    /// even when the wall clock has not advanced since the previous write.
    pub async fn update(&self, email: &str, update: UserUpdate) -> Result<Option<UserRecord>> {
        let Some(mut record) = self.get(email).await? else {
            return Ok(None);
        };

        if let Some(items) = update.items {
            record.items = items;
        }
        if let Some(dietary) = update.dietary {
            record.dietary = dietary;
        }
        if let Some(api_key_encrypted) = update.api_key_encrypted {
            record.api_key_encrypted = api_key_encrypted;
        }

        let now = Utc::now();
        record.updated_at = if now > record.updated_at {
            now
        } else {
            record.updated_at + chrono::Duration::milliseconds(1)
        };

        self.persist(&record).await?;
        Ok(Some(record))
    }

    /// Overwrites `items` and `dietary` with the client's copy (last write
    /// wins), creating the record if needed. A supplied non-empty `api_key`
    /// is encrypted and stored; `None` leaves any existing key untouched.
    pub async fn sync_from_client(
        &self,
        email: &str,
        items: Vec<String>,
        dietary: String,
        api_key: Option<&str>,
    ) -> Result<UserRecord> {
        let mut update = UserUpdate {
            items: Some(items),
            dietary: Some(dietary),
            api_key_encrypted: None,
        };
        if let Some(api_key) = api_key.filter(|k| !k.is_empty()) {
            update.api_key_encrypted = Some(Some(self.encrypt_api_key(api_key)?));
        }

        self.get_or_create(email).await?;
        self.update(email, update).await?.ok_or(Error::Internal {
            operation: "sync user data".to_string(),
        })
    }

    /// Encrypts an API key for inclusion in a [`UserUpdate`]. An empty key
    /// signals removal and maps to `None`.
    pub fn encrypt_api_key_field(&self, api_key: &str) -> Result<Option<String>> {
        if api_key.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.encrypt_api_key(api_key)?))
        }
    }

    fn encrypt_api_key(&self, api_key: &str) -> Result<String> {
        self.cipher.encrypt(api_key).map_err(|e| Error::Internal {
            operation: format!("encrypt api key: {e}"),
        })
    }

    /// Decrypts the user's stored API key, if any.
    ///
    /// A record that fails to decrypt (encryption secret rotated, corrupted
    /// ciphertext) is reported as absent rather than an error; the caller
    /// falls through to its other key sources.
    pub async fn api_key(&self, email: &str) -> Result<Option<String>> {
        let Some(record) = self.get(email).await? else {
            return Ok(None);
        };
        let Some(encrypted) = record.api_key_encrypted else {
            return Ok(None);
        };
        match self.cipher.decrypt(&encrypted) {
            Ok(key) => Ok(Some(key)),
            Err(e) => {
                warn!(email, "stored api key failed to decrypt, ignoring: {e}");
                Ok(None)
            }
        }
    }

    /// Removes the user record. Returns `false` if no record existed.
    pub async fn delete(&self, email: &str) -> Result<bool> {
        if self.get(email).await?.is_none() {
            return Ok(false);
        }
        self.kv.delete(&[keys::USER, email]).await?;
        Ok(true)
    }

    async fn persist(&self, record: &UserRecord) -> Result<()> {
        Ok(kv::set_typed(self.kv.as_ref(), &[keys::USER, &record.email], record, None).await?)
    }
}
