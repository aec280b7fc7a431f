//! Repository implementations for database access.
//!
//! Each entity in §3 has a corresponding repository implementing the
//! [`Repository`] trait for its common CRUD shape, plus whatever
//! entity-specific methods it needs (bulk inserts for the row tables,
//! monotonic chunk-counters for jobs). Repositories are constructed from a
//! `&mut PgConnection` borrowed out of a [`crate::db::tenancy::TenantSession`]
//! so every query they run is scoped to the tenant session's RLS context.
//!
//! ```ignore
//! use rowpipe::db::tenancy::with_tenant_session;
//! use rowpipe::db::handlers::{Datasets, Repository};
//!
//! with_tenant_session(&pool, owner, |session| async {
//!     let mut repo = Datasets::new(session.connection());
//!     repo.list(&filter).await
//! }).await?;
//! ```

pub mod ad_spends;
pub mod analytics;
pub mod click_rows;
pub mod datasets;
pub mod job_chunks;
pub mod jobs;
pub mod repository;
pub mod transaction_rows;
pub mod users;

pub use ad_spends::{AdSpendFilter, AdSpends};
pub use click_rows::{ClickRowFilter, ClickRows};
pub use datasets::{DatasetFilter, Datasets};
pub use job_chunks::JobChunks;
pub use jobs::{JobFilter, Jobs};
pub use repository::Repository;
pub use transaction_rows::{TransactionRowFilter, TransactionRows};
pub use users::{UserFilter, Users};
