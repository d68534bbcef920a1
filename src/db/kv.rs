use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqlitePool;

pub mod keys {
    pub const API_BASE_URL: &str = "apiBaseUrl";
    pub const ALLOWLIST_DOMAINS: &str = "allowlistDomains";
    pub const BLOCKLIST_DOMAINS: &str = "blocklistDomains";
    pub const LATEST_ANALYSIS: &str = "latestAnalysis";
    pub const LATEST_EMAIL_CONTEXT: &str = "latestEmailContext";
    pub const LATEST_EMAIL_FINGERPRINT: &str = "latestEmailFingerprint";
}

pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>>;
    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>>;
}

pub async fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(Value::Null) | None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .with_context(|| format!("stored value for {key} has an unexpected shape")),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)?;
    store.set(key, value).await
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl KeyValueStore for SqliteStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            let row: Option<(String,)> = sqlx::query_as(r#"SELECT value FROM kv WHERE key = ?1"#)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            row.map(|(raw,)| {
                serde_json::from_str(&raw).with_context(|| format!("corrupt json stored under {key}"))
            })
            .transpose()
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let raw = serde_json::to_string(&value)?;
            sqlx::query(
                r#"INSERT OR REPLACE INTO kv (key, value, updated_at)
                    VALUES (?1, ?2, CURRENT_TIMESTAMP)"#,
            )
            .bind(key)
            .bind(raw)
            .execute(&self.pool)
            .await?;
            tracing::debug!(target: "db", key, "value stored");
            Ok(())
        })
    }
}
