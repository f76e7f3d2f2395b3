//! Component self-test used by `news-agent test` and `GET /test`.

use serde::Serialize;

use crate::analyze::types::Importance;
use crate::scheduler::Scheduler;

const PROBE_CONTENT: &str =
    "The Federal Reserve unexpectedly cut its benchmark rate by 50 basis points, \
     citing a sharp slowdown in payroll growth.";

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            message: message.into(),
        }
    }

    fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
    pub passed: bool,
    pub checks: Vec<CheckResult>,
}

/// Storage ping, feed fetch, classifier probe, then one full run through the
/// scheduler so it cannot overlap a timer run.
pub async fn run_self_test(scheduler: &Scheduler) -> SelfTestReport {
    let agent = scheduler.agent();
    let mut checks = Vec::with_capacity(4);

    let store = agent.store();
    checks.push(if store.ping().await {
        CheckResult::pass("storage", format!("{} backend reachable", store.backend()))
    } else {
        CheckResult::fail("storage", format!("{} backend unreachable", store.backend()))
    });

    checks.push(match agent.feed().fetch().await {
        Ok(items) if !items.is_empty() => {
            CheckResult::pass("feed", format!("fetched {} items", items.len()))
        }
        Ok(_) => CheckResult::fail("feed", "feed returned no items"),
        Err(e) => CheckResult::fail("feed", format!("{e:#}")),
    });

    let verdict = agent.classifier().classify(PROBE_CONTENT).await;
    checks.push(if verdict.importance == Importance::Failed {
        CheckResult::fail("classifier", verdict.summary)
    } else {
        CheckResult::pass(
            "classifier",
            format!("probe classified as {}", verdict.importance),
        )
    });

    let report = scheduler.run_once().await;
    checks.push(if report.success {
        CheckResult::pass(
            "pipeline",
            format!(
                "{} fetched, {} important, {} saved",
                report.raw_news_count, report.important_news_count, report.saved_count
            ),
        )
    } else {
        CheckResult::fail("pipeline", report.error)
    });

    for c in &checks {
        if c.passed {
            tracing::info!(check = c.name, message = %c.message, "self-test check passed");
        } else {
            tracing::error!(check = c.name, message = %c.message, "self-test check failed");
        }
    }

    SelfTestReport {
        passed: checks.iter().all(|c| c.passed),
        checks,
    }
}
