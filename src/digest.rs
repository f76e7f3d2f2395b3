//! Digest composer: turns important-news analyses into one prose digest and merges
//! new findings into an existing digest. Neither operation can fail a run; both
//! degrade to deterministic text when the model is unavailable.

use crate::analyze::ai_adapter::{ChatRequest, DynModel};
use crate::analyze::prompts;
use crate::analyze::types::ImportantNewsRecord;

/// Digest text used when a run found nothing important.
pub const NO_NEWS_SENTINEL: &str = "No important news today.";
/// Marker placed between the old digest and appended content when merging degrades.
pub const MERGE_FALLBACK_MARKER: &str = "[new content]";

pub struct DigestComposer {
    model: DynModel,
}

impl DigestComposer {
    pub fn new(model: DynModel) -> Self {
        Self { model }
    }

    /// One cohesive digest for `records`, or the sentinel when there are none.
    pub async fn compose(&self, records: &[ImportantNewsRecord]) -> String {
        if records.is_empty() {
            return NO_NEWS_SENTINEL.to_string();
        }

        let numbered = prompts::numbered_summaries(records);
        let req = ChatRequest::user(prompts::compose_prompt(&numbered));
        match self.model.complete(req).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::error!(error = %e, "digest composition failed, using plain list");
                bullet_digest(records)
            }
        }
    }

    /// Fold `new_records` into `existing`. No new records leaves `existing` untouched.
    pub async fn merge(
        &self,
        existing: &str,
        new_digest: &str,
        new_records: &[ImportantNewsRecord],
    ) -> String {
        if new_records.is_empty() {
            tracing::info!("no new important news, keeping existing digest");
            return existing.to_string();
        }

        let numbered = prompts::numbered_summaries(new_records);
        let req = ChatRequest::user(prompts::merge_prompt(existing, &numbered));
        match self.model.complete(req).await {
            Ok(text) => {
                tracing::info!("digest merged");
                text.trim().to_string()
            }
            Err(e) => {
                tracing::error!(error = %e, "digest merge failed, appending new digest");
                format!("{existing}\n\n{MERGE_FALLBACK_MARKER}\n{new_digest}")
            }
        }
    }
}

/// Deterministic digest: a header plus one bullet per summary.
pub fn bullet_digest(records: &[ImportantNewsRecord]) -> String {
    let bullets = records
        .iter()
        .map(|r| format!("• {}", r.summary))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Today's important news:\n{bullets}")
}
