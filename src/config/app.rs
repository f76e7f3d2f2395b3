// src/config/app.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

const ENV_PATH: &str = "NEWS_AGENT_CONFIG";
const DEFAULT_PATH: &str = "config/news_agent.toml";

pub const DEFAULT_FEED_URL: &str = "http://volefuture.com/redis/get_latest_news/";
pub const DEFAULT_INTERVAL_HOURS: f64 = 6.0;
const MAX_INTERVAL_HOURS: f64 = 24.0 * 30.0;
const REDACTED: &str = "***";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_hours: f64,
    /// Timer precision: the loop wakes this often to check whether a run is due.
    pub poll_secs: u64,
    pub stop_wait_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: DEFAULT_INTERVAL_HOURS,
            poll_secs: 60,
            stop_wait_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "ENV" means: read from OPENAI_API_KEY
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_content_chars: usize,
    pub rubric_path: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: "ENV".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            max_content_chars: 6000,
            rubric_path: None,
        }
    }
}

impl LlmConfig {
    /// Rubric text from `rubric_path`, if configured.
    pub fn load_rubric(&self) -> Result<Option<String>> {
        let Some(p) = &self.rubric_path else {
            return Ok(None);
        };
        let text = fs::read_to_string(p)
            .with_context(|| format!("reading rubric from {}", p.display()))?;
        let text = text.trim();
        if text.is_empty() {
            bail!("rubric file {} is empty", p.display());
        }
        Ok(Some(text.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mysql,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub acquire_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Mysql,
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "news_agent".to_string(),
            acquire_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default directive when RUST_LOG is unset.
    pub level: String,
    /// "compact" | "json"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub schedule: ScheduleConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
    pub http: HttpConfig,
}

impl AppConfig {
    /// Parse a TOML file, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg.finish())
    }

    /// Load config using env var + fallbacks:
    /// 1) $NEWS_AGENT_CONFIG
    /// 2) config/news_agent.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default().finish())
    }

    fn finish(mut self) -> Self {
        self.apply_env();
        self.sanitize();
        self
    }

    fn apply_env(&mut self) {
        if self.llm.api_key.trim().eq_ignore_ascii_case("env") {
            self.llm.api_key = env_nonempty("OPENAI_API_KEY").unwrap_or_default();
        }
        if let Some(v) = env_nonempty("OPENAI_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = env_nonempty("OPENAI_MODEL") {
            self.llm.model = v;
        }

        if let Some(v) = env_nonempty("DB_HOST") {
            self.storage.host = v;
        }
        if let Some(v) = env_nonempty("DB_PORT") {
            match v.parse() {
                Ok(p) => self.storage.port = p,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid DB_PORT"),
            }
        }
        if let Some(v) = env_nonempty("DB_USER") {
            self.storage.user = v;
        }
        if let Ok(v) = env::var("DB_PASSWORD") {
            self.storage.password = v;
        }
        if let Some(v) = env_nonempty("DB_NAME") {
            self.storage.database = v;
        }

        if let Some(v) = env_nonempty("PORT") {
            match v.parse() {
                Ok(p) => self.http.port = p,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid PORT"),
            }
        }
    }

    fn sanitize(&mut self) {
        let h = self.schedule.interval_hours;
        if !h.is_finite() || h <= 0.0 || h > MAX_INTERVAL_HOURS {
            tracing::warn!(interval_hours = h, "invalid schedule interval, using default");
            self.schedule.interval_hours = DEFAULT_INTERVAL_HOURS;
        }
        if self.schedule.poll_secs == 0 {
            self.schedule.poll_secs = ScheduleConfig::default().poll_secs;
        }
        if self.feed.timeout_secs == 0 {
            tracing::warn!("feed.timeout_secs = 0, using default");
            self.feed.timeout_secs = FeedConfig::default().timeout_secs;
        }
        if self.llm.timeout_secs == 0 {
            tracing::warn!("llm.timeout_secs = 0, using default");
            self.llm.timeout_secs = LlmConfig::default().timeout_secs;
        }
        if self.llm.max_content_chars == 0 {
            self.llm.max_content_chars = LlmConfig::default().max_content_chars;
        }
        self.llm.base_url = self.llm.base_url.trim_end_matches('/').to_string();
    }

    /// The classifier refuses to start without these.
    pub fn validate_llm(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            bail!("LLM API key is not configured (set OPENAI_API_KEY or llm.api_key)");
        }
        if self.llm.model.trim().is_empty() {
            bail!("LLM model is not configured (set OPENAI_MODEL or llm.model)");
        }
        Ok(())
    }

    /// Copy safe to print: secrets replaced.
    pub fn redacted(&self) -> AppConfig {
        let mut c = self.clone();
        if !c.llm.api_key.is_empty() {
            c.llm.api_key = REDACTED.to_string();
        }
        if !c.storage.password.is_empty() {
            c.storage.password = REDACTED.to_string();
        }
        c
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
