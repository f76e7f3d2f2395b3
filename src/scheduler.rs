//! Recurring scheduler for the news agent.
//!
//! A single tokio task polls every `poll` and fires a run once the monotonic
//! deadline has passed, so precision is bounded by `poll` (default one minute).
//! Runs are serialized by `run_lock`; timer runs and manual runs never overlap.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::app::DEFAULT_INTERVAL_HOURS;
use crate::history::RunHistory;
use crate::pipeline::{NewsAgent, RunReport};

pub const HISTORY_CAPACITY: usize = 50;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub poll: Duration,
    pub stop_wait: Duration,
}

impl SchedulerConfig {
    /// Non-positive, NaN or overflowing hours fall back to the default interval.
    pub fn from_hours(interval_hours: f64, poll_secs: u64, stop_wait_secs: u64) -> Self {
        let interval = Duration::try_from_secs_f64(interval_hours * 3600.0)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| {
                tracing::warn!(interval_hours, "invalid scheduler interval, using default");
                Duration::from_secs_f64(DEFAULT_INTERVAL_HOURS * 3600.0)
            });
        Self {
            interval,
            poll: Duration::from_secs(poll_secs.max(1)),
            stop_wait: Duration::from_secs(stop_wait_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub interval_hours: f64,
    pub poll_secs: u64,
    pub next_run_time: Option<DateTime<Utc>>,
    pub runs_completed: u64,
    pub last_run: Option<RunReport>,
}

struct Armed {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    agent: Arc<NewsAgent>,
    cfg: SchedulerConfig,
    running: AtomicBool,
    /// Bumped by every `start` and `stop`; a `start` only arms if it is still current.
    generation: AtomicU64,
    armed: tokio::sync::Mutex<Option<Armed>>,
    run_lock: tokio::sync::Mutex<()>,
    next_run: Mutex<Option<DateTime<Utc>>>,
    history: RunHistory,
}

impl Scheduler {
    pub fn new(agent: Arc<NewsAgent>, cfg: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            agent,
            cfg,
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            armed: tokio::sync::Mutex::new(None),
            run_lock: tokio::sync::Mutex::new(()),
            next_run: Mutex::new(None),
            history: RunHistory::with_capacity(HISTORY_CAPACITY),
        })
    }

    pub fn agent(&self) -> &Arc<NewsAgent> {
        &self.agent
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn config(&self) -> SchedulerConfig {
        self.cfg
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the pipeline now, waiting for any in-flight run first.
    pub async fn run_once(&self) -> RunReport {
        let _guard = self.run_lock.lock().await;
        tracing::info!(target: "scheduler", "running news agent job");
        let report = self.agent.run().await;
        if report.success {
            tracing::info!(
                target: "scheduler",
                duration_ms = report.duration_ms,
                raw = report.raw_news_count,
                important = report.important_news_count,
                saved = report.saved_count,
                "job finished"
            );
        } else {
            tracing::error!(target: "scheduler", error = %report.error, "job failed");
        }
        self.history.push(report.clone());
        report
    }

    /// Arm the recurring timer, optionally running once first. Any previously armed
    /// loop is cleared so exactly one loop exists afterwards. The scheduler reports
    /// running from the moment `start` is called; a `stop` during the immediate run
    /// cancels the arming.
    pub async fn start(self: &Arc<Self>, run_immediately: bool) {
        let (generation, prev) = {
            let mut armed = self.armed.lock().await;
            if self.is_running() {
                tracing::warn!(target: "scheduler", "scheduler already running, re-arming");
            }
            self.running.store(true, Ordering::SeqCst);
            (self.generation.fetch_add(1, Ordering::SeqCst) + 1, armed.take())
        };
        if let Some(prev) = prev {
            disarm(prev, self.cfg.stop_wait).await;
        }

        if run_immediately {
            tracing::info!(target: "scheduler", "running first job immediately");
            self.run_once().await;
        }

        let mut armed = self.armed.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::info!(target: "scheduler", "scheduler stopped or restarted during start, not arming");
            return;
        }
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(self).timer_loop(rx));
        let replaced = armed.replace(Armed {
            shutdown: tx,
            handle,
        });
        drop(armed);
        if let Some(replaced) = replaced {
            disarm(replaced, self.cfg.stop_wait).await;
        }
        tracing::info!(
            target: "scheduler",
            interval_secs = self.cfg.interval.as_secs(),
            poll_secs = self.cfg.poll.as_secs(),
            "scheduler started"
        );
    }

    /// Disarm the timer and wait (bounded) for the loop to exit. Also cancels a
    /// `start` that is still in its immediate run.
    /// Returns `false` when the loop had to be detached.
    pub async fn stop(&self) -> bool {
        let armed = {
            let mut armed = self.armed.lock().await;
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            armed.take()
        };
        *self.next_run.lock().expect("next_run mutex poisoned") = None;
        match armed {
            None => {
                tracing::info!(target: "scheduler", "scheduler not armed");
                true
            }
            Some(armed) => {
                tracing::info!(target: "scheduler", "stopping scheduler");
                let joined = disarm(armed, self.cfg.stop_wait).await;
                tracing::info!(target: "scheduler", joined, "scheduler stopped");
                joined
            }
        }
    }

    /// `start`, then block until Ctrl-C / SIGTERM, then `stop`.
    pub async fn run_forever(self: &Arc<Self>, run_immediately: bool) {
        self.start(run_immediately).await;
        tracing::info!(target: "scheduler", "scheduler running, press Ctrl+C to stop");
        shutdown_signal().await;
        tracing::info!(target: "scheduler", "interrupt received, stopping");
        self.stop().await;
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.is_running(),
            interval_hours: self.cfg.interval.as_secs_f64() / 3600.0,
            poll_secs: self.cfg.poll.as_secs(),
            next_run_time: *self.next_run.lock().expect("next_run mutex poisoned"),
            runs_completed: self.history.total_runs(),
            last_run: self.history.last(),
        }
    }

    fn set_next_run(&self, from_now: Duration) {
        let at = chrono::Duration::from_std(from_now)
            .ok()
            .map(|d| Utc::now() + d);
        *self.next_run.lock().expect("next_run mutex poisoned") = at;
        if let Some(at) = at {
            tracing::info!(target: "scheduler", next_run = %at.to_rfc3339(), "next run scheduled");
        }
    }

    async fn timer_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut due = Instant::now() + self.cfg.interval;
        self.set_next_run(self.cfg.interval);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.cfg.poll) => {
                    if Instant::now() >= due {
                        self.run_once().await;
                        due = Instant::now() + self.cfg.interval;
                        self.set_next_run(self.cfg.interval);
                    }
                }
            }
        }
        tracing::debug!(target: "scheduler", "timer loop exited");
    }
}

async fn disarm(armed: Armed, wait: Duration) -> bool {
    let _ = armed.shutdown.send(true);
    match tokio::time::timeout(wait, armed.handle).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(target: "scheduler", error = %e, "timer loop panicked");
            false
        }
        Err(_) => {
            tracing::warn!(
                target: "scheduler",
                wait_secs = wait.as_secs(),
                "timer loop still busy, detaching it"
            );
            false
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "installing Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "installing SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
