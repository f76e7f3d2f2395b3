// src/analyze/mod.rs
//! Analysis: model adapter, importance classifier and the filter stage.

pub mod ai_adapter;
pub mod classifier;
pub mod filter;
pub mod prompts;
pub mod types;

// Re-export convenient types.
pub use crate::analyze::ai_adapter::{ChatRequest, DynModel, LanguageModel, LlmError, OpenAiChat};
pub use crate::analyze::classifier::ImportanceClassifier;
pub use crate::analyze::filter::filter_important;
pub use crate::analyze::types::{Importance, ImportanceVerdict, ImportantNewsRecord};
