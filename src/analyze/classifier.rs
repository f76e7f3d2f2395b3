//! Importance classifier.
//!
//! Two tiers: a structured-output request first, then a free-text request whose
//! reply is scanned for a JSON object. `classify` never fails; the worst case is a
//! `FAILED` verdict carrying a diagnostic summary.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_json::Value;

use crate::analyze::ai_adapter::{ChatRequest, DynModel, LlmError};
use crate::analyze::prompts;
use crate::analyze::types::{Importance, ImportanceVerdict};
use crate::ingest::truncate_chars;

/// How much of a bad model reply is kept in a `FAILED` verdict.
pub const FAILED_SUMMARY_CHARS: usize = 200;
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 6000;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("classify_total", "News items sent to the classifier.");
        describe_counter!(
            "classify_fallback_total",
            "Classifications that needed the JSON-extraction tier."
        );
        describe_counter!(
            "classify_failed_total",
            "Classifications that ended with a FAILED verdict."
        );
    });
}

pub struct ImportanceClassifier {
    model: DynModel,
    rubric: String,
    max_content_chars: usize,
}

#[derive(Debug, Deserialize)]
struct StructuredVerdict {
    importance: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    keywords: Option<String>,
}

/// Why the JSON-extraction tier gave up; keeps the raw reply when there was one.
#[derive(Debug)]
enum FallbackError {
    Model(LlmError),
    Unparseable { raw: String },
}

impl ImportanceClassifier {
    pub fn new(model: DynModel) -> Self {
        Self {
            model,
            rubric: prompts::DEFAULT_RUBRIC.to_string(),
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    pub fn with_rubric(mut self, rubric: impl Into<String>) -> Self {
        self.rubric = rubric.into();
        self
    }

    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max.max(1);
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Classify one news body. Total: every outcome is a verdict.
    pub async fn classify(&self, content: &str) -> ImportanceVerdict {
        ensure_metrics_described();
        counter!("classify_total").increment(1);

        let content = truncate_chars(content, self.max_content_chars);

        match self.classify_structured(&content).await {
            Ok(v) => {
                tracing::debug!(importance = %v.importance, "structured classification");
                return v;
            }
            Err(e) => {
                tracing::info!(error = %e, "structured output failed, trying JSON mode");
                counter!("classify_fallback_total").increment(1);
            }
        }

        match self.classify_json_mode(&content).await {
            Ok(v) => v,
            Err(FallbackError::Unparseable { raw }) => {
                tracing::warn!(
                    preview = %truncate_chars(&raw, 100),
                    "JSON mode failed: no usable JSON object in reply"
                );
                counter!("classify_failed_total").increment(1);
                ImportanceVerdict::failed(truncate_chars(&raw, FAILED_SUMMARY_CHARS))
            }
            Err(FallbackError::Model(e)) => {
                tracing::warn!(error = %e, "JSON mode failed: model call");
                counter!("classify_failed_total").increment(1);
                ImportanceVerdict::failed(truncate_chars(
                    &format!("classification failed: {e}"),
                    FAILED_SUMMARY_CHARS,
                ))
            }
        }
    }

    /// Same as `classify`, for bodies that may not be valid UTF-8.
    pub async fn classify_bytes(&self, content: &[u8]) -> ImportanceVerdict {
        self.classify(&String::from_utf8_lossy(content)).await
    }

    async fn classify_structured(&self, content: &str) -> anyhow::Result<ImportanceVerdict> {
        let req = ChatRequest::user(prompts::structured_user_prompt(content))
            .with_system(prompts::structured_system_prompt(&self.rubric))
            .with_schema(prompts::verdict_schema());
        let raw = self.model.complete(req).await?;
        let parsed: StructuredVerdict = serde_json::from_str(raw.trim())?;
        let importance = Importance::from_label(&parsed.importance)
            .ok_or_else(|| anyhow::anyhow!("unknown importance label {:?}", parsed.importance))?;
        Ok(ImportanceVerdict {
            importance,
            summary: parsed.summary.unwrap_or_default(),
            keywords: parsed.keywords.unwrap_or_default(),
        })
    }

    async fn classify_json_mode(&self, content: &str) -> Result<ImportanceVerdict, FallbackError> {
        let req = ChatRequest::user(prompts::json_fallback_prompt(content, &self.rubric));
        let raw = self.model.complete(req).await.map_err(FallbackError::Model)?;
        parse_loose_verdict(&raw).ok_or(FallbackError::Unparseable { raw })
    }
}

/// Parse a free-text reply: first balanced JSON object, missing keys defaulted.
pub fn parse_loose_verdict(raw: &str) -> Option<ImportanceVerdict> {
    let span = first_json_object(raw)?;
    let obj = match serde_json::from_str::<Value>(span).ok()? {
        Value::Object(obj) => obj,
        _ => return None,
    };
    let importance = obj
        .get("importance")
        .and_then(Value::as_str)
        .and_then(Importance::from_label)
        .unwrap_or(Importance::Low);
    Some(ImportanceVerdict {
        importance,
        summary: text_field(obj.get("summary")),
        keywords: text_field(obj.get("keywords")),
    })
}

fn text_field(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| match i {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

/// Locate the first balanced `{...}` span, skipping braces inside JSON strings.
pub fn first_json_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find('{') {
        let start = search_from + rel;
        let mut depth = 0usize;
        let mut in_str = false;
        let mut escaped = false;
        for (off, ch) in text[start..].char_indices() {
            if in_str {
                match ch {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_str = false,
                    _ => {}
                }
                continue;
            }
            match ch {
                '"' => in_str = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..start + off + 1]);
                    }
                }
                _ => {}
            }
        }
        // Unbalanced from this brace; try the next one.
        search_from = start + 1;
    }
    None
}
