// tests/common/mod.rs
//
// Shared fakes for integration tests: a rule-driven language model, fixed and
// slow feeds, and a store that refuses selected titles.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use market_news_agent::ai_adapter::{ChatRequest, DynModel, LanguageModel, LlmError};
use market_news_agent::analyze::classifier::ImportanceClassifier;
use market_news_agent::digest::DigestComposer;
use market_news_agent::ingest::{FeedSource, RawNewsItem};
use market_news_agent::pipeline::NewsAgent;
use market_news_agent::store::{InMemoryStore, NewNewsRow, NewsStore, StoredNews};

pub const DIGEST_REPLY: &str = "Fed cut rates; BigCo beat earnings.";

/// Language model backed by a closure; records every request it sees.
pub struct FnModel<F> {
    f: F,
    calls: AtomicUsize,
    seen: Mutex<Vec<ChatRequest>>,
}

impl<F> FnModel<F>
where
    F: Fn(&ChatRequest) -> Result<String, LlmError> + Send + Sync,
{
    pub fn new(f: F) -> Arc<Self> {
        Arc::new(Self {
            f,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> LanguageModel for FnModel<F>
where
    F: Fn(&ChatRequest) -> Result<String, LlmError> + Send + Sync,
{
    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(req.clone());
        (self.f)(&req)
    }

    fn name(&self) -> &str {
        "fake-model"
    }
}

pub fn is_compose(req: &ChatRequest) -> bool {
    req.user.starts_with("Based on the following")
}

pub fn is_merge(req: &ChatRequest) -> bool {
    req.user.starts_with("Merge the existing")
}

pub fn is_json_fallback(req: &ChatRequest) -> bool {
    req.user.starts_with("Analyze how important")
}

/// Deterministic "market analyst":
/// - content mentioning a rate decision is HIGH, earnings is MEDIUM, anything else LOW
/// - content containing `UNPARSEABLE` breaks both classification tiers
/// - digest prompts get `DIGEST_REPLY`, merge prompts `MERGED`
pub fn market_reply(req: &ChatRequest) -> Result<String, LlmError> {
    if req.schema.is_some() {
        let content = req.user.as_str();
        if content.contains("UNPARSEABLE") {
            return Err(LlmError::Transport("structured output unavailable".into()));
        }
        let reply = if content.contains("rate") {
            r#"{"importance":"高","summary":"Fed cuts rates","keywords":"fed,rates"}"#
        } else if content.contains("earnings") {
            r#"{"importance":"中","summary":"BigCo beats earnings","keywords":"bigco,earnings"}"#
        } else {
            r#"{"importance":"低","summary":"","keywords":""}"#
        };
        return Ok(reply.to_string());
    }
    if is_json_fallback(req) {
        return Ok("I'm sorry, I cannot rate this news.".to_string());
    }
    if is_compose(req) {
        return Ok(DIGEST_REPLY.to_string());
    }
    if is_merge(req) {
        return Ok("MERGED".to_string());
    }
    Err(LlmError::EmptyResponse)
}

pub fn market_model() -> Arc<FnModel<fn(&ChatRequest) -> Result<String, LlmError>>> {
    FnModel::new(market_reply as fn(&ChatRequest) -> Result<String, LlmError>)
}

/// The five-item batch: rate decision, earnings beat, DeFi patch note, weather, broken.
pub fn scenario_items() -> Vec<RawNewsItem> {
    vec![
        RawNewsItem::new(
            "Fed cuts policy rate",
            "The Federal Reserve cut its policy rate by 50 basis points.",
        ),
        RawNewsItem::new(
            "BigCo earnings beat",
            "BigCo reported quarterly earnings well above analyst estimates.",
        ),
        RawNewsItem::new(
            "Small DeFi patch",
            "A small DeFi protocol shipped patch notes for version 1.2.3.",
        ),
        RawNewsItem::new("Sunny weekend", "Sunny weather is expected this weekend."),
        RawNewsItem::new("Garbled item", "UNPARSEABLE payload"),
    ]
}

/// Feed returning a fixed result; counts fetches.
pub struct StaticFeed {
    items: Result<Vec<RawNewsItem>, String>,
    fetches: AtomicUsize,
}

impl StaticFeed {
    pub fn ok(items: Vec<RawNewsItem>) -> Arc<Self> {
        Arc::new(Self {
            items: Ok(items),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn err(msg: &str) -> Arc<Self> {
        Arc::new(Self {
            items: Err(msg.to_string()),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> anyhow::Result<Vec<RawNewsItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.items {
            Ok(items) => Ok(items.clone()),
            Err(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }

    fn name(&self) -> &'static str {
        "static-feed"
    }
}

/// Feed that sleeps before answering with nothing.
pub struct SlowFeed {
    pub delay: Duration,
}

#[async_trait]
impl FeedSource for SlowFeed {
    async fn fetch(&self) -> anyhow::Result<Vec<RawNewsItem>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "slow-feed"
    }
}

/// In-memory store whose inserts fail for the listed titles.
pub struct RefusingStore {
    pub inner: InMemoryStore,
    refuse: Vec<String>,
}

impl RefusingStore {
    pub fn new(refuse: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::new(),
            refuse: refuse.iter().map(|s| s.to_string()).collect(),
        })
    }
}

#[async_trait]
impl NewsStore for RefusingStore {
    async fn exists(&self, title: &str) -> bool {
        self.inner.exists(title).await
    }

    async fn insert(&self, row: &NewNewsRow) -> bool {
        if self.refuse.iter().any(|t| t == &row.title) {
            return false;
        }
        self.inner.insert(row).await
    }

    async fn latest(&self, limit: usize) -> Vec<StoredNews> {
        self.inner.latest(limit).await
    }

    async fn ping(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "refusing"
    }
}

pub fn agent_with(
    feed: Arc<dyn FeedSource>,
    model: DynModel,
    store: Arc<dyn NewsStore>,
) -> NewsAgent {
    NewsAgent::new(
        feed,
        Arc::new(ImportanceClassifier::new(model.clone())),
        Arc::new(DigestComposer::new(model)),
        store,
    )
}
