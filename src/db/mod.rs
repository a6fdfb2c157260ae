use async_trait::async_trait;
use chrono::Utc;
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions}, Sqlite, Row};
use tokio::sync::broadcast;

use crate::storage::{announce, BackingStore, StorageError, StorageEvent, TabId, SIGNAL_CAPACITY};

/// SQLite-backed durable store, one row per key.
///
/// The change signal only reaches tabs holding this same handle. Tabs in
/// other processes pointed at the same file see changes through polling.
pub struct Database {
    pool: SqlitePool,
    signal: broadcast::Sender<StorageEvent>,
}

impl Database {
    pub async fn connect(db_url: &str) -> Result<Self, StorageError> {
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        // An in-memory database lives and dies with its one connection
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(db_url)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await?
        };

        Self::init_schema(&pool).await?;

        let (signal, _) = broadcast::channel(SIGNAL_CAPACITY);
        Ok(Self { pool, signal })
    }

    // Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BackingStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM poll_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set(&self, origin: TabId, key: &str, value: &str) -> Result<(), StorageError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO poll_storage (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        announce(
            &self.signal,
            StorageEvent {
                key: key.to_string(),
                new_value: Some(value.to_string()),
                origin,
                at: now,
            },
        );
        Ok(())
    }

    async fn remove(&self, origin: TabId, key: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM poll_storage WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            announce(
                &self.signal,
                StorageEvent {
                    key: key.to_string(),
                    new_value: None,
                    origin,
                    at: Utc::now(),
                },
            );
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<StorageEvent> {
        self.signal.subscribe()
    }
}
