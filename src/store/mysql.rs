// src/store/mysql.rs
//! MySQL-backed news store (sqlx).
//!
//! The pool connects lazily and replaces dead connections on acquire; on top of that,
//! every statement is retried once when it fails with a connection-class error.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::Row;

use super::{NewNewsRow, NewsStore, StoredNews};
use crate::ingest::truncate_chars;

/// Width of the `title` column; titles are clipped to this for both lookups and inserts.
pub const TITLE_MAX_CHARS: usize = 512;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS news (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    title VARCHAR(512) NOT NULL,
    summary TEXT NOT NULL,
    importance VARCHAR(16) NOT NULL,
    content MEDIUMTEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    UNIQUE KEY uq_news_title (title)
) DEFAULT CHARSET = utf8mb4
"#;

#[derive(Debug, Clone)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub acquire_timeout: Duration,
}

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Build a lazily-connected pool; no network traffic happens here.
    pub fn connect_lazy(s: &MySqlSettings) -> Self {
        let opts = MySqlConnectOptions::new()
            .host(&s.host)
            .port(s.port)
            .username(&s.user)
            .password(&s.password)
            .database(&s.database)
            .charset("utf8mb4")
            .ssl_mode(MySqlSslMode::Preferred);
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(s.acquire_timeout)
            .test_before_acquire(true)
            .connect_lazy_with(opts);
        Self { pool }
    }

    /// Create the `news` table when missing.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .context("creating news table")?;
        Ok(())
    }

    async fn retry_once<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, sqlx::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        match f().await {
            Err(e) if is_connection_error(&e) => {
                tracing::warn!(op, error = %e, "storage connection dropped, retrying once");
                f().await
            }
            other => other,
        }
    }
}

fn is_connection_error(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}

fn title_key(title: &str) -> String {
    truncate_chars(title, TITLE_MAX_CHARS)
}

fn map_row(row: &MySqlRow) -> Result<StoredNews, sqlx::Error> {
    Ok(StoredNews {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        importance: row.try_get("importance")?,
        content: row.try_get("content")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait::async_trait]
impl NewsStore for MySqlStore {
    async fn exists(&self, title: &str) -> bool {
        let key = title_key(title);
        let res = self
            .retry_once("exists", || {
                sqlx::query("SELECT COUNT(*) FROM news WHERE title = ?")
                    .bind(key.as_str())
                    .fetch_one(&self.pool)
            })
            .await
            .and_then(|row| row.try_get::<i64, _>(0));
        match res {
            Ok(n) => n > 0,
            Err(e) => {
                tracing::error!(error = %e, "checking news existence failed");
                false
            }
        }
    }

    async fn insert(&self, row: &NewNewsRow) -> bool {
        let key = title_key(&row.title);
        let res = self
            .retry_once("insert", || {
                sqlx::query(
                    "INSERT INTO news (title, summary, importance, content) VALUES (?, ?, ?, ?)",
                )
                .bind(key.as_str())
                .bind(row.summary.as_str())
                .bind(row.importance.as_str())
                .bind(row.content.as_str())
                .execute(&self.pool)
            })
            .await;
        match res {
            Ok(_) => {
                tracing::info!(title = %truncate_chars(&row.title, 60), "news inserted");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, title = %truncate_chars(&row.title, 60), "inserting news failed");
                false
            }
        }
    }

    async fn latest(&self, limit: usize) -> Vec<StoredNews> {
        let limit = limit as i64;
        let res = self
            .retry_once("latest", || {
                sqlx::query(
                    "SELECT id, title, summary, importance, content, created_at \
                     FROM news ORDER BY created_at DESC, id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
            })
            .await;
        match res {
            Ok(rows) => rows
                .iter()
                .filter_map(|r| match map_row(r) {
                    Ok(n) => Some(n),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping undecodable news row");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "loading latest news failed");
                Vec::new()
            }
        }
    }

    async fn ping(&self) -> bool {
        match self
            .retry_once("ping", || sqlx::query("SELECT 1").execute(&self.pool))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "storage ping failed");
                false
            }
        }
    }

    fn backend(&self) -> &'static str {
        "mysql"
    }
}
