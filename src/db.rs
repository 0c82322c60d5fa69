use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use crate::error::{AppError, Result};
use std::time::Duration;

/// Embedded schema migrations, applied in order.
const MIGRATIONS: &[(i32, &str, &str)] = &[(
    1,
    "create_users_and_sessions",
    include_str!("../migrations/0001_create_users_and_sessions.sql"),
)];

/// Creates a new database connection pool.
///
/// # Arguments
///
/// * `database_url` - The URL of the PostgreSQL database.
///
/// # Returns
///
/// A `Result` containing the `Pool`.
pub fn create_pool(database_url: &str) -> Result<Pool> {
    let mut cfg = Config::new();
    let pg_config: tokio_postgres::Config = database_url.parse()?;

    if let Some(tokio_postgres::config::Host::Tcp(hostname)) = pg_config.get_hosts().first() {
        cfg.host = Some(hostname.to_string());
    }

    if let Some(port) = pg_config.get_ports().first() {
        cfg.port = Some(*port);
    }

    if let Some(dbname) = pg_config.get_dbname() {
        cfg.dbname = Some(dbname.to_string());
    }

    if let Some(user) = pg_config.get_user() {
        cfg.user = Some(user.to_string());
    }

    if let Some(password) = pg_config.get_password() {
        cfg.password = Some(String::from_utf8_lossy(password).to_string());
    }

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    // A handful of admins; the pool never needs to be large.
    cfg.pool = Some(PoolConfig {
        max_size: 8,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(1)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(AppError::from)
}

/// Applies every embedded migration that has not run yet.
///
/// Each migration runs in its own transaction together with its
/// bookkeeping row, so a failure leaves the schema at the last good version.
pub async fn run_migrations(pool: &Pool) -> Result<()> {
    let mut client = pool.get().await?;

    client
        .batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .await
        .map_err(|e| AppError::Migration(format!("bootstrap: {}", e)))?;

    for (version, name, sql) in MIGRATIONS {
        let applied = client
            .query_opt(
                "SELECT version FROM schema_migrations WHERE version = $1",
                &[version],
            )
            .await?
            .is_some();

        if applied {
            tracing::debug!("Migration {} ({}) already applied", version, name);
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(sql)
            .await
            .map_err(|e| AppError::Migration(format!("{} ({}): {}", version, name, e)))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)",
            &[version, name],
        )
        .await?;
        tx.commit().await?;

        tracing::info!("✅ Migration {} ({}) applied", version, name);
    }

    Ok(())
}
