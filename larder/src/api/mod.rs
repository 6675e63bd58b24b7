//! HTTP API surface.
//!
//! Split into [`models`] (the request/response contract) and [`handlers`]
//! (the Axum route handlers implementing it).

pub mod handlers;
pub mod models;
