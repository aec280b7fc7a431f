//! Database record models matching table schemas (§3).
//!
//! Each module's structs correspond directly to a table in `migrations/`;
//! repositories in [`crate::db::handlers`] return these models and accept
//! them as insert/update parameters. Database models are kept distinct from
//! API models ([`crate::api::models`]) so storage and wire representations
//! can evolve independently.

pub mod ad_spends;
pub mod click_rows;
pub mod datasets;
pub mod jobs;
pub mod transaction_rows;
pub mod users;
