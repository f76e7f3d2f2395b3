//! Pipeline orchestrator: fetch → classify/filter → compose → persist.
//!
//! Each stage takes the previous `RunState` snapshot and returns a new one; the
//! `Stage` enum carries the transitions. Every run ends in exactly one `RunReport`.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local, NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::analyze::classifier::ImportanceClassifier;
use crate::analyze::filter::filter_important;
use crate::analyze::types::{Importance, ImportantNewsRecord};
use crate::digest::{DigestComposer, NO_NEWS_SENTINEL};
use crate::ingest::{truncate_chars, FeedSource, RawNewsItem};
use crate::store::{NewNewsRow, NewsStore};

pub const DIGEST_ROW_SUMMARY: &str = "AI-generated daily news digest";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed pipeline runs.");
        describe_counter!("pipeline_failed_runs_total", "Pipeline runs that ended with an error.");
        describe_counter!("news_saved_total", "Rows written by the persist stage.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last finished.");
    });
}

/// Title of the digest row for `date`.
pub fn digest_title(date: NaiveDate) -> String {
    format!("Daily news digest - {}", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Classify,
    Compose,
    Persist,
    End,
}

impl Stage {
    /// Transition after `self` produced `state`.
    pub fn next(self, state: &RunState) -> Stage {
        match self {
            Stage::Fetch if state.raw_news.is_empty() || state.has_error() => Stage::End,
            Stage::Fetch => Stage::Classify,
            Stage::Classify => Stage::Compose,
            Stage::Compose => Stage::Persist,
            Stage::Persist | Stage::End => Stage::End,
        }
    }
}

/// Per-run state. Fresh for every run, never shared between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub raw_news: Vec<RawNewsItem>,
    pub important_news: Vec<ImportantNewsRecord>,
    pub final_summary: String,
    pub saved_count: usize,
    pub error: String,
    pub trace: Vec<String>,
}

impl RunState {
    pub fn started() -> Self {
        Self {
            trace: vec!["run started".to_string()],
            ..Self::default()
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    fn traced(mut self, line: impl Into<String>) -> Self {
        self.trace.push(line.into());
        self
    }

    fn failed(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        self.trace.push(error.clone());
        self.error = error;
        self
    }
}

/// The only artifact that leaves a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub raw_news_count: usize,
    pub important_news_count: usize,
    pub saved_count: usize,
    pub final_summary: String,
    pub error: String,
    pub trace: Vec<String>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn from_state(state: &RunState, duration_ms: u64) -> Self {
        Self {
            success: !state.has_error(),
            timestamp: Utc::now(),
            raw_news_count: state.raw_news.len(),
            important_news_count: state.important_news.len(),
            saved_count: state.saved_count,
            final_summary: state.final_summary.clone(),
            error: state.error.clone(),
            trace: state.trace.clone(),
            duration_ms,
        }
    }
}

/// Orchestrator. Collaborators are injected; nothing here is global.
pub struct NewsAgent {
    feed: Arc<dyn FeedSource>,
    classifier: Arc<ImportanceClassifier>,
    composer: Arc<DigestComposer>,
    store: Arc<dyn NewsStore>,
}

impl NewsAgent {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        classifier: Arc<ImportanceClassifier>,
        composer: Arc<DigestComposer>,
        store: Arc<dyn NewsStore>,
    ) -> Self {
        Self {
            feed,
            classifier,
            composer,
            store,
        }
    }

    pub fn feed(&self) -> &Arc<dyn FeedSource> {
        &self.feed
    }

    pub fn classifier(&self) -> &Arc<ImportanceClassifier> {
        &self.classifier
    }

    pub fn store(&self) -> &Arc<dyn NewsStore> {
        &self.store
    }

    /// Run all stages once.
    pub async fn run(&self) -> RunReport {
        ensure_metrics_described();
        let t0 = Instant::now();
        tracing::info!(target: "pipeline", "news agent run starting");

        let mut stage = Stage::Fetch;
        let mut state = RunState::started();
        loop {
            state = match stage {
                Stage::Fetch => self.fetch_stage(&state).await,
                Stage::Classify => self.classify_stage(&state).await,
                Stage::Compose => self.compose_stage(&state).await,
                Stage::Persist => self.persist_stage(&state).await,
                Stage::End => break,
            };
            stage = stage.next(&state);
        }

        let report = RunReport::from_state(&state, t0.elapsed().as_millis() as u64);
        counter!("pipeline_runs_total").increment(1);
        if !report.success {
            counter!("pipeline_failed_runs_total").increment(1);
        }
        gauge!("pipeline_last_run_ts").set(report.timestamp.timestamp() as f64);
        tracing::info!(
            target: "pipeline",
            success = report.success,
            raw = report.raw_news_count,
            important = report.important_news_count,
            saved = report.saved_count,
            "news agent run finished"
        );
        report
    }

    pub async fn fetch_stage(&self, prev: &RunState) -> RunState {
        tracing::info!(target: "pipeline", feed = self.feed.name(), "fetching news");
        let next = prev.clone();
        match self.feed.fetch().await {
            Ok(items) if items.is_empty() => {
                tracing::warn!(target: "pipeline", "no news fetched");
                next.failed("no news items fetched")
            }
            Ok(items) => {
                tracing::info!(target: "pipeline", count = items.len(), "news fetched");
                let line = format!("fetched {} news items", items.len());
                RunState {
                    raw_news: items,
                    ..next
                }
                .traced(line)
            }
            Err(e) => {
                tracing::error!(target: "pipeline", error = %format!("{e:#}"), "fetching news failed");
                next.failed(format!("failed to fetch news: {e:#}"))
            }
        }
    }

    pub async fn classify_stage(&self, prev: &RunState) -> RunState {
        let important = filter_important(&self.classifier, &prev.raw_news).await;
        let line = if important.is_empty() {
            "analysis finished, no important news".to_string()
        } else {
            format!("analysis finished, {} important news", important.len())
        };
        RunState {
            important_news: important,
            ..prev.clone()
        }
        .traced(line)
    }

    pub async fn compose_stage(&self, prev: &RunState) -> RunState {
        let summary = self.composer.compose(&prev.important_news).await;
        RunState {
            final_summary: summary,
            ..prev.clone()
        }
        .traced("digest composed")
    }

    pub async fn persist_stage(&self, prev: &RunState) -> RunState {
        let mut saved = 0usize;
        let mut failed = 0usize;
        let mut trace = Vec::new();

        for rec in &prev.important_news {
            if self.store.exists(&rec.original_title).await {
                tracing::info!(
                    target: "pipeline",
                    title = %truncate_chars(&rec.original_title, 60),
                    "news already stored, skipping"
                );
                continue;
            }
            let row = NewNewsRow {
                title: rec.original_title.clone(),
                summary: rec.summary.clone(),
                content: rec.original_content.clone(),
                importance: rec.importance,
            };
            if self.store.insert(&row).await {
                saved += 1;
            } else {
                failed += 1;
                trace.push(format!(
                    "insert failed: {}",
                    truncate_chars(&rec.original_title, 60)
                ));
            }
        }

        if !prev.final_summary.is_empty() && prev.final_summary != NO_NEWS_SENTINEL {
            let title = digest_title(Local::now().date_naive());
            if !self.store.exists(&title).await {
                let row = NewNewsRow {
                    title: title.clone(),
                    summary: DIGEST_ROW_SUMMARY.to_string(),
                    content: prev.final_summary.clone(),
                    importance: Importance::High,
                };
                if self.store.insert(&row).await {
                    saved += 1;
                } else {
                    failed += 1;
                    trace.push(format!("insert failed: {title}"));
                }
            }
        }

        counter!("news_saved_total").increment(saved as u64);
        tracing::info!(target: "pipeline", saved, failed, "persist finished");

        let mut next = prev.clone();
        next.saved_count = saved;
        next.trace.extend(trace);
        let next = next.traced(format!("saved {saved} records"));
        if failed > 0 {
            next.failed(format!("failed to persist {failed} record(s)"))
        } else {
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_short_circuits_on_empty_or_error() {
        let empty = RunState::started();
        assert_eq!(Stage::Fetch.next(&empty), Stage::End);

        let mut with_items = RunState::started();
        with_items.raw_news.push(RawNewsItem::new("t", "c"));
        assert_eq!(Stage::Fetch.next(&with_items), Stage::Classify);

        with_items.error = "boom".into();
        assert_eq!(Stage::Fetch.next(&with_items), Stage::End);
    }

    #[test]
    fn later_stages_always_advance() {
        let mut s = RunState::started();
        s.error = "persist failure".into();
        assert_eq!(Stage::Classify.next(&s), Stage::Compose);
        assert_eq!(Stage::Compose.next(&s), Stage::Persist);
        assert_eq!(Stage::Persist.next(&s), Stage::End);
    }

    #[test]
    fn report_mirrors_state() {
        let mut s = RunState::started();
        s.raw_news.push(RawNewsItem::new("t", "c"));
        s.saved_count = 1;
        s.final_summary = "digest".into();
        let r = RunReport::from_state(&s, 12);
        assert!(r.success);
        assert_eq!(r.raw_news_count, 1);
        assert_eq!(r.important_news_count, 0);
        assert_eq!(r.saved_count, 1);
        assert_eq!(r.trace, vec!["run started".to_string()]);
        assert_eq!(r.duration_ms, 12);

        s.error = "x".into();
        assert!(!RunReport::from_state(&s, 0).success);
    }

    #[test]
    fn digest_title_uses_iso_date() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(digest_title(d), "Daily news digest - 2026-10-19");
    }
}
