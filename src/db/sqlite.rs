use crate::db::schema::SQLITE_INIT;
use crate::error::TrackerError;
use backon::{ExponentialBuilder, Retryable};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub type SqlitePool = Pool<Sqlite>;

/// Handle to the relational store. Queries live in one `impl Storage`
/// block per entity group (`users.rs`, `fleet.rs`, ...).
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open (creating if missing) the database and initialize the schema.
    /// The first connection is retried with backoff so a slow volume mount
    /// does not kill the process.
    pub async fn connect(database_url: &str) -> Result<Self, TrackerError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        if let Some(parent) = connect_opts.get_filename().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(3))
            .with_max_times(5);

        let pool = (|| async {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(connect_opts.clone())
                .await
        })
        .retry(retry_policy)
        .notify(|err: &sqlx::Error, dur: Duration| {
            warn!(error = %err, "database connect failed, retrying in {:?}", dur);
        })
        .await?;

        let storage = Self::new(pool);
        storage.init_schema().await?;
        info!(database_url, "database ready");
        Ok(storage)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), TrackerError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }
}
