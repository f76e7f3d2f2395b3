//! Filter stage: the only place that decides which items are important.

use crate::analyze::classifier::ImportanceClassifier;
use crate::analyze::types::{Importance, ImportantNewsRecord};
use crate::ingest::{truncate_chars, RawNewsItem};

/// Classify every item in order and keep the HIGH/MEDIUM ones.
/// Failed classifications are logged and skipped; they never abort the batch.
pub async fn filter_important(
    classifier: &ImportanceClassifier,
    items: &[RawNewsItem],
) -> Vec<ImportantNewsRecord> {
    let total = items.len();
    tracing::info!(total, "analyzing news importance");

    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        tracing::debug!(n = i + 1, total, "classifying item");
        let verdict = classifier.classify(&item.content).await;
        match verdict.importance {
            Importance::Failed => {
                tracing::error!(
                    title = %truncate_chars(&item.title, 60),
                    error = %verdict.summary,
                    "news analysis failed, skipping"
                );
            }
            Importance::Low => {}
            Importance::High | Importance::Medium => {
                tracing::info!(
                    title = %truncate_chars(&item.title, 60),
                    importance = %verdict.importance,
                    "important news found"
                );
                out.extend(ImportantNewsRecord::from_verdict(item, verdict));
            }
        }
    }

    tracing::info!(important = out.len(), total, "filtering finished");
    out
}
