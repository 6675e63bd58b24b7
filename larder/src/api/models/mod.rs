//! API request and response data models.
//!
//! These structures define the public API contract and are kept separate from
//! the persisted record types, so storage and API representations can evolve
//! independently. All models carry `utoipa` annotations for the generated
//! OpenAPI document.
//!
//! - [`recipes`]: recipe generation request/response payloads
//! - [`auth`]: login, verification, and logout payloads
//! - [`users`]: profile update and sync payloads
//! - [`info`]: the service info document served at the API root

pub mod auth;
pub mod info;
pub mod recipes;
pub mod users;
