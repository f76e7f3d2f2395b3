// src/store/mod.rs
//! Persistence gateway. Implementations never raise across this interface:
//! failures come back as `false` / empty and are logged where they happen.

pub mod mysql;

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyze::types::Importance;

pub use mysql::{MySqlSettings, MySqlStore};

/// Row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNewsRow {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub importance: Importance,
}

/// Row as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredNews {
    pub id: u64,
    pub title: String,
    pub summary: String,
    pub importance: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait NewsStore: Send + Sync {
    /// True when a row with exactly this title is stored.
    async fn exists(&self, title: &str) -> bool;
    /// Insert one row. Only call after `exists` returned false for the same title.
    async fn insert(&self, row: &NewNewsRow) -> bool;
    /// Most recent rows, newest first.
    async fn latest(&self, limit: usize) -> Vec<StoredNews>;
    /// Cheap connectivity probe.
    async fn ping(&self) -> bool;
    fn backend(&self) -> &'static str;
}

/// Mutex-guarded in-process store with the same title-uniqueness rule.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: Mutex<Vec<StoredNews>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn titles(&self) -> Vec<String> {
        self.rows
            .lock()
            .expect("store mutex poisoned")
            .iter()
            .map(|r| r.title.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl NewsStore for InMemoryStore {
    async fn exists(&self, title: &str) -> bool {
        let rows = self.rows.lock().expect("store mutex poisoned");
        rows.iter().any(|r| r.title == title)
    }

    async fn insert(&self, row: &NewNewsRow) -> bool {
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        if rows.iter().any(|r| r.title == row.title) {
            tracing::warn!(title = %row.title, "duplicate title rejected");
            return false;
        }
        let id = rows.len() as u64 + 1;
        rows.push(StoredNews {
            id,
            title: row.title.clone(),
            summary: row.summary.clone(),
            importance: row.importance.as_str().to_string(),
            content: row.content.clone(),
            created_at: Utc::now(),
        });
        true
    }

    async fn latest(&self, limit: usize) -> Vec<StoredNews> {
        let rows = self.rows.lock().expect("store mutex poisoned");
        rows.iter().rev().take(limit).cloned().collect()
    }

    async fn ping(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
