//! # rowpipe: multi-tenant CSV sales/clicks ingestion and analytics
//!
//! `rowpipe` accepts per-tenant CSV uploads of sales transactions or ad
//! clicks, normalizes and deduplicates their rows, and exposes the result
//! through a small dashboard/query API. Processing is asynchronous: a client
//! creates a job, uploads its CSV to a presigned object-store URL, commits
//! the job, and polls for completion.
//!
//! ## Architecture
//!
//! - **[`api`]** — Axum HTTP handlers and request/response DTOs (§6)
//! - **[`orchestrator`]** — the Job Orchestrator & Chunk Worker: an
//!   in-process tokio worker pool that streams an uploaded CSV, normalizes
//!   each row via [`ingestkit::normalize`], and batches inserts (§4.3)
//! - **[`allocator`]** — the Ad-Spend Allocator: proportionally distributes
//!   an ad spend's cost across a dataset's matching transaction rows (§4.6)
//! - **[`db`]** — repositories and the Tenancy Guard (row-level-security
//!   session scoping, §4.4)
//! - **[`auth`]** — password hashing and JWT bearer token issuance/verification
//! - **[`limits`]** — job-queue admission control (§5 backpressure)
//! - **[`config`]** — layered YAML + environment configuration (§6)
//!
//! The system is built on [Axum](https://github.com/tokio-rs/axum) for the
//! HTTP layer and PostgreSQL (via `sqlx`) for all persistence. Object
//! storage is pluggable (S3-compatible or local filesystem) behind
//! [`ingestkit::storage::ObjectStore`].

pub mod allocator;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod limits;
pub mod orchestrator;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use dashmap::DashMap;
use ingestkit::storage::{FsObjectStore, ObjectStore, S3ObjectStore};
use moka::future::Cache;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};

pub use config::Config;
use api::models::dashboard::DashboardResponse;
use db::handlers::{Repository, Users};
use db::models::users::UserCreateDBRequest;
use limits::{JobQueuePermit, Limiters};
pub use types::{AdSpendId, ClickRowId, DatasetId, JobId, TransactionRowId, UserId};

/// Dashboard aggregations are cached for this long (§4.5) — a snapshot
/// consistency contract already allows a concurrent write to be invisible
/// for a while, so a short TTL costs nothing beyond what §4.5 already permits.
const DASHBOARD_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(30);

/// Application state shared across all request handlers.
///
/// - `db`: the main PostgreSQL connection pool
/// - `config`: application configuration (§6), shared so background tasks
///   and handlers see the same values without re-reading the file
/// - `object_store`: the Object Store Adapter (§4.2) — S3-compatible or
///   filesystem-backed depending on `upload.temp_dir`
/// - `limiters`: job-queue admission control (§5)
/// - `worker_pool`: handle to the in-process Job Orchestrator (§4.3)
/// - `job_permits`: admission-control permits held between `create_job` and
///   `commit_job`/`delete_job` (§5) — a job's permit moves into its
///   [`orchestrator::WorkItem`] at commit time so it is released only once
///   the job reaches a terminal state
/// - `dashboard_cache`: short-TTL cache of `/dashboard` responses keyed on
///   `(owner, filters)` (§4.5)
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub object_store: Arc<dyn ObjectStore>,
    pub limiters: Limiters,
    pub worker_pool: orchestrator::WorkerPool,
    pub job_permits: Arc<DashMap<JobId, JobQueuePermit>>,
    pub dashboard_cache: Cache<String, DashboardResponse>,
}

/// Gets the rowpipe database migrator.
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Creates the initial admin user if it doesn't exist.
///
/// Idempotent: updates the password of an existing user with this email
/// rather than erroring, so it's safe to call on every startup.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &PgPool) -> Result<UserId, sqlx::Error> {
    let password_hash = match password {
        Some(pwd) => auth::password::hash_string(pwd).map_err(|e| sqlx::Error::Encode(format!("failed to hash admin password: {e}").into()))?,
        None => return Err(sqlx::Error::Configuration("admin_password must be set to create the initial admin user".into())),
    };

    let mut conn = db.acquire().await?;
    let mut users = Users::new(&mut conn);

    if let Some(existing) = users
        .get_by_email(email)
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("failed to check existing admin user: {e}")))?
    {
        sqlx::query!("UPDATE users SET password_hash = $1 WHERE id = $2", password_hash, existing.id)
            .execute(&mut *conn)
            .await?;
        return Ok(existing.id);
    }

    let created = users
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            password_hash,
        })
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("failed to create admin user: {e}")))?;

    Ok(created.id)
}

async fn build_object_store(config: &Config) -> Arc<dyn ObjectStore> {
    if let Some(temp_dir) = &config.upload.temp_dir {
        return Arc::new(FsObjectStore::new(std::path::PathBuf::from(temp_dir)));
    }

    let store = S3ObjectStore::from_config(
        &config.storage.endpoint,
        &config.storage.region,
        &config.storage.access_key,
        &config.storage.secret_key,
        config.storage.bucket.clone(),
    )
    .await;
    Arc::new(store)
}

/// Builds the Axum router wiring every handler in §6's endpoint table.
/// `/health` is the only route that doesn't require bearer auth — auth is
/// enforced per-handler via the [`api::models::users::CurrentUser`] extractor
/// rather than a blanket middleware, since it needs the request body parsed
/// for some handlers before the tenant context is known.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/jobs", post(api::handlers::jobs::create_job))
        .route("/jobs/{id}/commit", post(api::handlers::jobs::commit_job))
        .route("/jobs/{id}", get(api::handlers::jobs::get_job))
        .route("/jobs/{id}", delete(api::handlers::jobs::delete_job))
        .route("/datasets", get(api::handlers::datasets::list_datasets))
        .route("/datasets/{id}", delete(api::handlers::datasets::delete_dataset))
        .route("/datasets/{id}/rows", get(api::handlers::datasets::list_dataset_rows))
        .route("/dashboard", get(api::handlers::dashboard::get_dashboard))
        .route("/ad_spends", get(api::handlers::ad_spends::list_ad_spends))
        .route("/ad_spends", post(api::handlers::ad_spends::create_ad_spend))
        .route("/ad_spends/bulk", post(api::handlers::ad_spends::bulk_create_ad_spends))
        .route("/ad_spends/{id}", patch(api::handlers::ad_spends::update_ad_spend))
        .route("/ad_spends/{id}", delete(api::handlers::ad_spends::delete_ad_spend))
        .route("/ad_spends/{id}/allocate", post(api::handlers::ad_spends::allocate_ad_spend));

    Router::new()
        .route("/health", get(api::handlers::health::health))
        .merge(api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Owns the pool, router, and worker pool for the life of the process.
pub struct Application {
    router: Router,
    pool: PgPool,
    worker_pool: orchestrator::WorkerPool,
    config: Arc<Config>,
}

impl Application {
    /// Creates a new application instance: connects to the database, runs
    /// migrations, bootstraps the admin user, builds the object store and
    /// worker pool, and wires the router.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.db.max_connections)
            .connect(&config.db.url)
            .await?;
        Self::new_with_pool(config, pool).await
    }

    /// Creates a new application instance against an existing pool; used by
    /// tests where `#[sqlx::test]` provides the pool.
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        debug!(?config, "starting rowpipe");

        migrator().run(&pool).await?;

        if let Some(admin_password) = &config.admin_password {
            create_initial_admin_user(&config.admin_email, Some(admin_password), &pool).await?;
        }

        let config = Arc::new(config);
        let object_store = build_object_store(&config).await;
        let limiters = Limiters::new(&config.worker);
        let worker_pool = orchestrator::spawn_pool(pool.clone(), object_store.clone(), config.clone(), num_worker_threads());

        let dashboard_cache = Cache::builder().time_to_live(DASHBOARD_CACHE_TTL).build();

        let state = AppState {
            db: pool.clone(),
            config: config.clone(),
            object_store,
            limiters,
            worker_pool: worker_pool.clone(),
            job_permits: Arc::new(DashMap::new()),
            dashboard_cache,
        };

        let router = build_router(state);

        Ok(Self {
            router,
            pool,
            worker_pool,
            config,
        })
    }

    /// Starts serving the application until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("rowpipe listening on http://{}", bind_addr);

        let result = axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await;

        info!("shutting down worker pool...");
        self.worker_pool.shutdown();

        info!("closing database connections...");
        self.pool.close().await;

        Ok(result?)
    }
}

fn num_worker_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod test {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn creating_admin_user_is_idempotent(pool: PgPool) {
        let email = "admin@example.com";
        let first = create_initial_admin_user(email, Some("first-password"), &pool).await.unwrap();
        let second = create_initial_admin_user(email, Some("second-password"), &pool).await.unwrap();
        assert_eq!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);
        let user = users.get_by_email(email).await.unwrap().unwrap();
        assert!(auth::password::verify_string("second-password", &user.password_hash).unwrap());
    }
}
