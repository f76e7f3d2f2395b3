// src/ingest/types.rs
use anyhow::Result;

/// One normalized news item as it enters the pipeline.
/// Both fields are non-empty once produced by a `FeedSource`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawNewsItem {
    pub title: String,
    pub content: String,
}

impl RawNewsItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the latest batch. An empty vec means the feed had nothing for us.
    async fn fetch(&self) -> Result<Vec<RawNewsItem>>;
    fn name(&self) -> &'static str;
}
