//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all endpoints (§6)
//! - **[`models`]**: Request/response DTOs, kept distinct from [`crate::db::models`]
//!   so the wire format can evolve independently of storage
//!
//! Router construction lives alongside [`crate::AppState`] in `lib.rs`.

pub mod handlers;
pub mod models;
