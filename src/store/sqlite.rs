use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use crate::store::{DocumentStore, StoreError};

/// SQLite database holding every wallet document
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `database_url`, either a
    /// `sqlite:` URL or a plain file path
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url == "sqlite::memory:";
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL {}", database_url))?
            .create_if_missing(true);

        // every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", database_url))?;

        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT value FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row.try_get::<String, _>("value")).transpose()
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO documents (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM documents WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Keys of every stored document, sorted
    pub async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM documents ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(Into::into))
            .collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// One document stored as JSON under a fixed key
pub struct SqliteDocumentStore<T> {
    db: Arc<Database>,
    key: String,
    _document: PhantomData<fn() -> T>,
}

impl<T> SqliteDocumentStore<T> {
    pub fn new(db: Arc<Database>, key: impl Into<String>) -> Self {
        Self {
            db,
            key: key.into(),
            _document: PhantomData,
        }
    }
}

#[async_trait]
impl<T> DocumentStore<T> for SqliteDocumentStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self) -> Result<Option<T>, StoreError> {
        let Some(json) = self.db.read(&self.key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: self.key.clone(),
                source,
            })
    }

    async fn set(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.db.write(&self.key, &json).await?;
        debug!("Stored {} ({} bytes)", self.key, json.len());
        Ok(())
    }

    async fn delete(&self) -> Result<(), StoreError> {
        self.db.remove(&self.key).await?;
        Ok(())
    }
}

/// Initialize an in-memory database for testing
#[cfg(test)]
pub async fn init_test_db() -> Result<Database> {
    Database::new("sqlite::memory:").await
}
