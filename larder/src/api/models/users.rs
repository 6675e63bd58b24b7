//! API request/response models for user profiles.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::recipes::{MAX_ITEM_CHARS, MAX_REQUIREMENTS_CHARS};
use crate::errors::{Error, Result};
use crate::users::UserProfile;

/// Sync payloads may carry more items than a single recipe request uses.
pub const MAX_SYNC_ITEMS: usize = 100;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// Free-text dietary preference; replaces the stored value
    #[serde(default)]
    pub dietary: Option<String>,
    /// Provider API key; empty string removes the stored key
    #[serde(default)]
    pub api_key: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(dietary) = &self.dietary {
            validate_dietary(dietary)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SyncRequest {
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub dietary: String,
    /// Provider API key; omitted leaves any stored key untouched
    #[serde(default)]
    pub api_key: Option<String>,
}

impl SyncRequest {
    pub fn validate(&self) -> Result<()> {
        if self.items.len() > MAX_SYNC_ITEMS {
            return Err(Error::Validation {
                field: Some("items".to_string()),
                message: format!("Too many items (maximum {MAX_SYNC_ITEMS})"),
            });
        }
        for item in &self.items {
            if item.chars().count() > MAX_ITEM_CHARS {
                return Err(Error::Validation {
                    field: Some("items".to_string()),
                    message: "Item too long".to_string(),
                });
            }
        }
        validate_dietary(&self.dietary)
    }
}

fn validate_dietary(dietary: &str) -> Result<()> {
    if dietary.chars().count() > MAX_REQUIREMENTS_CHARS {
        return Err(Error::Validation {
            field: Some("dietary".to_string()),
            message: format!("Dietary text is too long (maximum {MAX_REQUIREMENTS_CHARS} characters)"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileResponse {
    pub success: bool,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}
