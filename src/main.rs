//! Market news agent - binary entrypoint.
//! Loads config, wires the pipeline and dispatches the CLI subcommand.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_news_agent::bootstrap::{build_agent, scheduler_config};
use market_news_agent::config::AppConfig;
use market_news_agent::metrics::Metrics;
use market_news_agent::scheduler::{shutdown_signal, Scheduler};
use market_news_agent::selftest::run_self_test;
use market_news_agent::create_router;

/// Periodic market-news digest agent
#[derive(Parser)]
#[command(name = "news-agent", version)]
#[command(about = "Fetch market news, keep the important ones, write a daily digest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check storage, feed, classifier and one full run
    Test,

    /// Run the pipeline once and print the report
    #[command(name = "run-once")]
    RunOnce,

    /// Run on the configured interval until interrupted
    Start {
        /// Run once immediately before arming the timer
        #[arg(long)]
        now: bool,
    },

    /// Print the effective configuration (secrets redacted)
    Info,

    /// Serve the HTTP API with the scheduler running in the background
    Serve,
}

fn init_tracing(cfg: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if cfg.log.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    };

    let cfg = match AppConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&cfg);

    match dispatch(command, cfg).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "news agent failed");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands, cfg: AppConfig) -> anyhow::Result<ExitCode> {
    if let Commands::Info = command {
        let printed =
            toml::to_string_pretty(&cfg.redacted()).context("rendering configuration")?;
        println!("{printed}");
        return Ok(ExitCode::SUCCESS);
    }

    let agent = Arc::new(build_agent(&cfg).await?);
    let scheduler = Scheduler::new(agent, scheduler_config(&cfg));

    match command {
        Commands::Test => {
            let report = run_self_test(&scheduler).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::RunOnce => {
            let report = scheduler.run_once().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Start { now } => {
            scheduler.run_forever(now).await;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Serve => {
            serve(scheduler, &cfg).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info => Ok(ExitCode::SUCCESS),
    }
}

async fn serve(scheduler: Arc<Scheduler>, cfg: &AppConfig) -> anyhow::Result<()> {
    let metrics = match Metrics::init(cfg.schedule.interval_hours) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "metrics disabled");
            None
        }
    };
    let app = create_router(scheduler.clone(), metrics.as_ref());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "http server listening");

    // First run happens in the background so the server answers immediately.
    let starter = scheduler.clone();
    tokio::spawn(async move { starter.start(true).await });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    tracing::info!("http server stopped, stopping scheduler");
    scheduler.stop().await;
    Ok(())
}
