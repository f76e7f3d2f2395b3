// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod digest;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod selftest;
pub mod store;

// Ingestion (feed adapter + normalization)
pub mod ingest;

// Importance classification, filtering and prompts
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use crate::api::create_router;
pub use crate::pipeline::{NewsAgent, RunReport, RunState};
pub use crate::scheduler::{Scheduler, SchedulerConfig};
