//! Bounded in-memory log of recent run reports for /status and /history.

use std::sync::Mutex;

use crate::pipeline::RunReport;

#[derive(Debug)]
pub struct RunHistory {
    inner: Mutex<Vec<RunReport>>,
    cap: usize,
    total: Mutex<u64>,
}

impl RunHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
            total: Mutex::new(0),
        }
    }

    pub fn push(&self, report: RunReport) {
        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push(report);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
        *self.total.lock().expect("history mutex poisoned") += 1;
    }

    /// Oldest-first slice of the last `n` reports.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<RunReport> {
        let v = self.inner.lock().expect("history mutex poisoned");
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn last(&self) -> Option<RunReport> {
        self.inner
            .lock()
            .expect("history mutex poisoned")
            .last()
            .cloned()
    }

    /// Runs recorded since startup (not capped).
    pub fn total_runs(&self) -> u64 {
        *self.total.lock().expect("history mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunState;

    fn report(saved: usize) -> RunReport {
        let mut s = RunState::started();
        s.saved_count = saved;
        RunReport::from_state(&s, 0)
    }

    #[test]
    fn keeps_only_the_newest_entries() {
        let h = RunHistory::with_capacity(2);
        for i in 0..5 {
            h.push(report(i));
        }
        let snap = h.snapshot_last_n(10);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].saved_count, 3);
        assert_eq!(snap[1].saved_count, 4);
        assert_eq!(h.last().map(|r| r.saved_count), Some(4));
        assert_eq!(h.total_runs(), 5);
    }

    #[test]
    fn empty_history() {
        let h = RunHistory::with_capacity(3);
        assert!(h.last().is_none());
        assert!(h.snapshot_last_n(3).is_empty());
        assert_eq!(h.total_runs(), 0);
    }
}
