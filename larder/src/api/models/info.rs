//! Service info document served at the API root.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,
}
