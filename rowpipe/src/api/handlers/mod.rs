//! Axum route handlers for all API endpoints (§6).
//!
//! Each handler extracts [`crate::api::models::users::CurrentUser`] from the
//! verified bearer token, runs its work inside
//! [`crate::db::tenancy::with_tenant_session`], and converts the
//! [`crate::db::models`] response into its [`crate::api::models`] DTO.

pub mod ad_spends;
pub mod auth;
pub mod dashboard;
pub mod datasets;
pub mod health;
pub mod jobs;
