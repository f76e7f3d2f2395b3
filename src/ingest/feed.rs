// src/ingest/feed.rs
//! HTTP news feed adapter.
//!
//! The upstream endpoint is not consistent about its payload shape, so everything
//! goes through `serde_json::Value` and is flattened by `extract_entries` before
//! each entry is mapped to a `RawNewsItem` by `normalize_entry`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::{Map, Value};

use crate::ingest::types::{FeedSource, RawNewsItem};
use crate::ingest::{ensure_metrics_described, normalize_body, normalize_text, truncate_chars};

/// Key under which wrapper objects carry their nested news list.
const WRAPPER_KEY: &str = "redis_value";
/// Keys probed (in order) when the payload is a single object.
const LIST_KEYS: &[&str] = &["redis_value", "data", "news", "items"];
/// Multi-line body alias; its first line doubles as a title.
const BODY_ALIAS: &str = "app_msg";
const TITLE_FIELDS: &[&str] = &["title", "headline", "subject", "name", "summary", BODY_ALIAS];
const CONTENT_FIELDS: &[&str] = &[
    "content",
    "body",
    "text",
    "description",
    "detail",
    "article",
    BODY_ALIAS,
];

const DERIVED_TITLE_CHARS: usize = 50;
const SCALAR_TITLE_CHARS: usize = 100;

pub struct HttpFeed {
    url: String,
    client: reqwest::Client,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("market-news-agent/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch(&self) -> Result<Vec<RawNewsItem>> {
        ensure_metrics_described();
        let t0 = std::time::Instant::now();

        let resp = match self
            .client
            .get(&self.url)
            .header("Accept", "application/json, text/plain, */*")
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = ?e, url = %self.url, "feed http error");
                counter!("feed_errors_total").increment(1);
                return Err(e).context("feed http get()");
            }
        };
        let resp = resp.error_for_status().map_err(|e| {
            counter!("feed_errors_total").increment(1);
            anyhow::Error::new(e).context("feed returned non-success status")
        })?;
        let body = resp.text().await.context("feed http .text()")?;

        let items = parse_feed_body(&body);
        histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "http-feed"
    }
}

/// Parse a raw response body into normalized items. Non-JSON bodies become one item.
pub fn parse_feed_body(body: &str) -> Vec<RawNewsItem> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let payload = match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(
                preview = %truncate_chars(trimmed, 200),
                "feed response is not JSON, treating it as a single item"
            );
            let mut obj = Map::new();
            obj.insert("title".into(), Value::String("API response".into()));
            obj.insert("content".into(), Value::String(trimmed.to_string()));
            Value::Object(obj)
        }
    };
    normalize_entries(extract_entries(payload))
}

/// Flatten any of the supported payload shapes into a list of entries.
pub fn extract_entries(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(arr) => {
            let wrapped = matches!(arr.first(), Some(Value::Object(o)) if o.contains_key(WRAPPER_KEY));
            if !wrapped {
                return arr;
            }
            arr.into_iter()
                .filter_map(|it| match it {
                    Value::Object(mut o) => match o.remove(WRAPPER_KEY) {
                        Some(Value::Array(inner)) => Some(inner),
                        _ => None,
                    },
                    _ => None,
                })
                .flatten()
                .collect()
        }
        Value::Object(mut obj) => {
            for key in LIST_KEYS {
                if let Some(inner) = obj.remove(*key) {
                    return match inner {
                        Value::Array(arr) => arr,
                        Value::Null => Vec::new(),
                        other => vec![other],
                    };
                }
            }
            vec![Value::Object(obj)]
        }
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    }
}

/// Map entries to items, dropping the ones that end up without title or content.
pub fn normalize_entries(entries: Vec<Value>) -> Vec<RawNewsItem> {
    let total = entries.len();
    let items: Vec<RawNewsItem> = entries.iter().filter_map(normalize_entry).collect();
    let dropped = total - items.len();
    counter!("feed_items_total").increment(items.len() as u64);
    counter!("feed_dropped_total").increment(dropped as u64);
    if dropped > 0 {
        tracing::debug!(dropped, "feed entries dropped during normalization");
    }
    items
}

pub fn normalize_entry(entry: &Value) -> Option<RawNewsItem> {
    let (title, content) = match entry {
        Value::Object(obj) => {
            let content = first_field(obj, CONTENT_FIELDS)
                .map(|(_, v)| normalize_body(&v))
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| entry.to_string());
            let title = first_field(obj, TITLE_FIELDS)
                .map(|(field, v)| {
                    if field == BODY_ALIAS {
                        normalize_text(v.lines().next().unwrap_or_default())
                    } else {
                        normalize_text(&v)
                    }
                })
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("{}...", truncate_chars(&content, DERIVED_TITLE_CHARS)));
            (title, content)
        }
        other => {
            let text = scalar_text(other)?;
            let content = text.trim().to_string();
            let title = normalize_text(&derived_title(&content, SCALAR_TITLE_CHARS));
            (title, content)
        }
    };

    if title.is_empty() || content.is_empty() {
        return None;
    }
    Some(RawNewsItem { title, content })
}

fn first_field(obj: &Map<String, Value>, fields: &[&'static str]) -> Option<(&'static str, String)> {
    fields.iter().find_map(|field| {
        let text = scalar_text(obj.get(*field)?)?;
        let text = text.trim();
        (!text.is_empty()).then(|| (*field, text.to_string()))
    })
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn derived_title(content: &str, max: usize) -> String {
    if content.chars().count() > max {
        format!("{}...", truncate_chars(content, max))
    } else {
        content.to_string()
    }
}
