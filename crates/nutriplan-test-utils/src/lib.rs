//! Postgres for nutriplan's integration tests.
//!
//! Every test binary shares one server and every test gets a freshly
//! migrated database on it, usually through [`TestDb`]. The server is
//! `NUTRIPLAN_TEST_PG_URL` when set (a root URL without a database name),
//! otherwise a Postgres 18 container started on first use.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use nutriplan_db::models::Profile;
use nutriplan_db::pool;
use nutriplan_db::queries::profiles;

/// Connections per test database. Covers the concurrent plan activation
/// tests, where every waiter holds a connection while blocked on the lock.
pub const TEST_POOL_CONNECTIONS: u32 = 6;

struct SharedPg {
    base_url: String,
    /// `None` when the server comes from `NUTRIPLAN_TEST_PG_URL`.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("NUTRIPLAN_TEST_PG_URL") {
        return SharedPg {
            base_url: url,
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("18")
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    let base_url = format!("postgresql://postgres:postgres@{host}:{port}");

    SharedPg {
        base_url,
        _container: Some(container),
    }
}

/// Root URL of the shared server, starting it if needed.
pub async fn pg_url() -> &'static str {
    let shared = SHARED_PG.get_or_init(init_shared_pg).await;
    &shared.base_url
}

/// Create a uniquely named, migrated database and return a pool on it with
/// its name. Pair with [`drop_test_db`].
pub async fn create_test_db() -> (PgPool, String) {
    let base_url = pg_url().await;

    let maint_url = format!("{base_url}/postgres");
    let maint_pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&maint_url)
        .await
        .expect("failed to connect to maintenance database in container");

    let db_name = format!("nutriplan_test_{}", Uuid::new_v4().simple());
    let stmt = format!("CREATE DATABASE {db_name}");
    maint_pool
        .execute(stmt.as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create temp database {db_name}: {e}"));
    maint_pool.close().await;

    let temp_url = format!("{base_url}/{db_name}");
    let temp_pool = PgPoolOptions::new()
        .max_connections(TEST_POOL_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&temp_url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to temp database {db_name}: {e}"));

    pool::run_migrations(&temp_pool)
        .await
        .expect("migrations should succeed");

    (temp_pool, db_name)
}

/// Drop a database from [`create_test_db`], disconnecting any stragglers.
/// Dropping twice is harmless.
pub async fn drop_test_db(db_name: &str) {
    let base_url = pg_url().await;
    let maint_url = format!("{base_url}/postgres");

    let maint_pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&maint_url)
        .await
        .expect("failed to connect to maintenance database for cleanup");

    let terminate = format!(
        "SELECT pg_terminate_backend(pid) \
         FROM pg_stat_activity \
         WHERE datname = '{db_name}' AND pid <> pg_backend_pid()"
    );
    let _ = maint_pool.execute(terminate.as_str()).await;

    let stmt = format!("DROP DATABASE IF EXISTS {db_name}");
    let _ = maint_pool.execute(stmt.as_str()).await;
    maint_pool.close().await;
}

/// Insert a profile with a fresh user ID and return it.
pub async fn create_test_profile(pool: &PgPool) -> Profile {
    let id = Uuid::new_v4();
    let email = format!("{}@example.test", id.simple());
    profiles::create_profile(pool, id, Some(&email), Some("Test User"))
        .await
        .expect("create_profile should succeed")
}

/// A migrated temporary database that tests tear down explicitly.
pub struct TestDb {
    pub pool: PgPool,
    pub db_name: String,
}

impl TestDb {
    pub async fn new() -> Self {
        let (pool, db_name) = create_test_db().await;
        Self { pool, db_name }
    }

    pub async fn teardown(self) {
        self.pool.close().await;
        drop_test_db(&self.db_name).await;
    }
}
