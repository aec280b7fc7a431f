//! Test-only [`AppState`] construction: the unit tests scattered across
//! `auth` and `db` need a fully-formed `AppState` without standing up real
//! object storage or an external worker pool.

use std::sync::Arc;

use dashmap::DashMap;
use ingestkit::storage::{FsObjectStore, ObjectStore};
use moka::future::Cache;
use sqlx::PgPool;

use crate::{AppState, Config, DASHBOARD_CACHE_TTL, limits::Limiters, orchestrator};

impl AppState {
    /// Builds an `AppState` backed by a filesystem object store rooted at a
    /// fresh temp directory and a single-worker in-process pool — enough for
    /// any test that doesn't itself exercise a full job run end to end.
    pub fn for_tests(pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);
        let root = tempfile::tempdir().expect("create temp dir for test object store").into_path();
        let object_store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(root));
        let worker_pool = orchestrator::spawn_pool(pool.clone(), object_store.clone(), config.clone(), 1);

        AppState {
            db: pool,
            config: config.clone(),
            object_store,
            limiters: Limiters::new(&config.worker),
            worker_pool,
            job_permits: Arc::new(DashMap::new()),
            dashboard_cache: Cache::builder().time_to_live(DASHBOARD_CACHE_TTL).build(),
        }
    }
}
