pub mod app;

pub use app::{
    AppConfig, FeedConfig, HttpConfig, LlmConfig, LogConfig, ScheduleConfig, StorageBackend,
    StorageConfig,
};
