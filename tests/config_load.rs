// tests/config_load.rs
use market_news_agent::config::{AppConfig, StorageBackend};
use std::{env, fs};

const ENV_KEYS: &[&str] = &[
    "NEWS_AGENT_CONFIG",
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "DB_HOST",
    "DB_PORT",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "PORT",
];

fn clear_env() {
    for k in ENV_KEYS {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn defaults_when_nothing_is_configured() {
    // Isolate CWD so the test never reads a real config/ directory
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.schedule.interval_hours, 6.0);
    assert_eq!(cfg.schedule.poll_secs, 60);
    assert_eq!(cfg.llm.model, "gpt-4o-mini");
    assert_eq!(cfg.llm.api_key, "");
    assert!(cfg.validate_llm().is_err());
    assert_eq!(cfg.storage.backend, StorageBackend::Mysql);
    assert_eq!(cfg.http.port, 8000);

    env::set_current_dir(old).unwrap();
}

#[serial_test::serial]
#[test]
fn file_fallback_then_env_overrides() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    fs::create_dir_all("config").unwrap();
    fs::write(
        "config/news_agent.toml",
        r#"
[feed]
url = "http://localhost:9999/news"

[schedule]
interval_hours = -3.0

[llm]
api_key = "ENV"
model = "file-model"

[storage]
backend = "memory"
database = "from_file"
"#,
    )
    .unwrap();

    env::set_var("OPENAI_API_KEY", "sk-from-env");
    env::set_var("DB_NAME", "from_env");
    env::set_var("PORT", "9100");

    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.feed.url, "http://localhost:9999/news");
    assert_eq!(cfg.schedule.interval_hours, 6.0, "negative interval is sanitized");
    assert_eq!(cfg.llm.api_key, "sk-from-env");
    assert_eq!(cfg.llm.model, "file-model");
    assert!(cfg.validate_llm().is_ok());
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.storage.database, "from_env");
    assert_eq!(cfg.http.port, 9100);

    let shown = toml::to_string_pretty(&cfg.redacted()).unwrap();
    assert!(!shown.contains("sk-from-env"));

    clear_env();
    env::set_current_dir(old).unwrap();
}

#[serial_test::serial]
#[test]
fn explicit_path_must_exist() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();

    env::set_var("NEWS_AGENT_CONFIG", tmp.path().join("missing.toml"));
    assert!(AppConfig::load_default().is_err());

    let p = tmp.path().join("agent.toml");
    fs::write(&p, "[llm]\napi_key = \"sk-literal\"\nrubric_path = \"rubric.txt\"\n").unwrap();
    env::set_var("NEWS_AGENT_CONFIG", &p);
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.llm.api_key, "sk-literal");
    // rubric file does not exist relative to CWD
    assert!(cfg.llm.load_rubric().is_err());

    clear_env();
}

#[test]
fn rubric_is_read_from_file() {
    let tmp = tempfile::tempdir().unwrap();
    let rubric = tmp.path().join("rubric.txt");
    fs::write(&rubric, "  HIGH: anything about rates\n").unwrap();

    let p = tmp.path().join("agent.toml");
    fs::write(
        &p,
        format!("[llm]\nrubric_path = {:?}\n", rubric.display().to_string()),
    )
    .unwrap();

    let cfg = AppConfig::load_from(&p).unwrap();
    assert_eq!(
        cfg.llm.load_rubric().unwrap().as_deref(),
        Some("HIGH: anything about rates")
    );
}

#[test]
fn malformed_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("bad.toml");
    fs::write(&p, "[schedule\ninterval_hours = ").unwrap();
    assert!(AppConfig::load_from(&p).is_err());
}
