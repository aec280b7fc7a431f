//! Request/response DTOs for the HTTP API (§6). Kept distinct from
//! [`crate::db::models`] so the wire format can evolve independently of
//! storage.

pub mod ad_spends;
pub mod dashboard;
pub mod datasets;
pub mod jobs;
pub mod users;
