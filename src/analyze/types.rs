use serde::{Deserialize, Serialize};

use crate::ingest::RawNewsItem;

/// Market-relevance importance. `Failed` marks a verdict the classifier could not produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Importance {
    High,
    Medium,
    Low,
    Failed,
}

impl Importance {
    /// Map a model label to a level. Accepts 高/中/低 and high/medium/low.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "高" | "high" => Some(Self::High),
            "中" | "medium" => Some(Self::Medium),
            "低" | "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Failed => "FAILED",
        }
    }

    /// HIGH and MEDIUM are the levels that survive the filter stage.
    pub fn is_important(&self) -> bool {
        matches!(self, Self::High | Self::Medium)
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output for one news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportanceVerdict {
    pub importance: Importance,
    pub summary: String,
    /// Comma-separated.
    pub keywords: String,
}

impl ImportanceVerdict {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            importance: Importance::Failed,
            summary: diagnostic.into(),
            keywords: String::new(),
        }
    }
}

/// A news item that passed the filter, paired with its analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportantNewsRecord {
    pub original_title: String,
    pub original_content: String,
    pub importance: Importance,
    pub summary: String,
    pub keywords: String,
}

impl ImportantNewsRecord {
    /// Pair an item with its verdict; `None` unless the verdict is HIGH or MEDIUM.
    pub fn from_verdict(item: &RawNewsItem, verdict: ImportanceVerdict) -> Option<Self> {
        if !verdict.importance.is_important() {
            return None;
        }
        Some(Self {
            original_title: item.title.clone(),
            original_content: item.content.clone(),
            importance: verdict.importance,
            summary: verdict.summary,
            keywords: verdict.keywords,
        })
    }
}
