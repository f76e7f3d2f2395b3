// src/bootstrap.rs
//! Wires the concrete collaborators from `AppConfig`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use crate::analyze::ai_adapter::{DynModel, OpenAiChat};
use crate::analyze::classifier::ImportanceClassifier;
use crate::config::{AppConfig, StorageBackend, StorageConfig};
use crate::digest::DigestComposer;
use crate::ingest::HttpFeed;
use crate::pipeline::NewsAgent;
use crate::scheduler::SchedulerConfig;
use crate::store::{InMemoryStore, MySqlSettings, MySqlStore, NewsStore};

/// Model client for both classifier and composer. Fails on missing key or model.
pub fn build_model(cfg: &AppConfig) -> anyhow::Result<DynModel> {
    cfg.validate_llm()?;
    let client = OpenAiChat::new(
        &cfg.llm.base_url,
        cfg.llm.api_key.clone(),
        cfg.llm.model.clone(),
        Duration::from_secs(cfg.llm.timeout_secs),
    )
    .context("building LLM client")?;
    // Safe diagnostics only: never the key itself
    info!(
        model = %cfg.llm.model,
        base_url = %cfg.llm.base_url,
        key_len = cfg.llm.api_key.len(),
        "LLM client ready"
    );
    Ok(Arc::new(client))
}

pub async fn build_store(cfg: &StorageConfig) -> Arc<dyn NewsStore> {
    match cfg.backend {
        StorageBackend::Memory => {
            info!("using in-memory storage");
            Arc::new(InMemoryStore::new())
        }
        StorageBackend::Mysql => {
            let settings = MySqlSettings {
                host: cfg.host.clone(),
                port: cfg.port,
                user: cfg.user.clone(),
                password: cfg.password.clone(),
                database: cfg.database.clone(),
                acquire_timeout: Duration::from_secs(cfg.acquire_timeout_secs),
            };
            let store = MySqlStore::connect_lazy(&settings);
            match store.ensure_schema().await {
                Ok(()) => info!(host = %cfg.host, db = %cfg.database, "mysql storage ready"),
                Err(e) => warn!(
                    error = %format!("{e:#}"),
                    "mysql schema check failed, storage calls will report failures"
                ),
            }
            Arc::new(store)
        }
    }
}

pub async fn build_agent(cfg: &AppConfig) -> anyhow::Result<NewsAgent> {
    let model = build_model(cfg)?;

    let mut classifier =
        ImportanceClassifier::new(model.clone()).with_max_content_chars(cfg.llm.max_content_chars);
    if let Some(rubric) = cfg.llm.load_rubric()? {
        info!("using custom importance rubric");
        classifier = classifier.with_rubric(rubric);
    }

    let feed = HttpFeed::new(
        cfg.feed.url.clone(),
        Duration::from_secs(cfg.feed.timeout_secs),
    )?;
    let store = build_store(&cfg.storage).await;

    Ok(NewsAgent::new(
        Arc::new(feed),
        Arc::new(classifier),
        Arc::new(DigestComposer::new(model)),
        store,
    ))
}

pub fn scheduler_config(cfg: &AppConfig) -> SchedulerConfig {
    SchedulerConfig::from_hours(
        cfg.schedule.interval_hours,
        cfg.schedule.poll_secs,
        cfg.schedule.stop_wait_secs,
    )
}
