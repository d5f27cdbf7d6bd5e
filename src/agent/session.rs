//! Process-wide bot state.
//!
//! The watching flag, verbose flag, seen set and counters all live behind
//! one mutex. The poller, the command listener and the health endpoint
//! only ever touch them through `Session`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::agent::poller::CycleReport;
use crate::alerts::dedup::SeenSet;
use crate::feed::models::AlertKey;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub cycles: u64,
    pub candidates: u64,
    pub qualifying: u64,
    pub alerts_sent: u64,
    pub suppressed: u64,
    pub fetch_failures: u64,
    pub send_failures: u64,
}

#[derive(Debug)]
pub struct SessionState {
    pub watching: bool,
    pub verbose: bool,
    pub seen: SeenSet,
    pub stats: SessionStats,
    pub started_at: DateTime<Utc>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Serializable view for `/status` and the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: &'static str,
    pub watching: bool,
    pub verbose: bool,
    pub seen: usize,
    pub stats: SessionStats,
    pub started_at: DateTime<Utc>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub uptime_seconds: i64,
}

impl SessionState {
    pub fn new(watching: bool) -> Self {
        Self {
            watching,
            verbose: false,
            seen: SeenSet::new(),
            stats: SessionStats::default(),
            started_at: Utc::now(),
            last_cycle_at: None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: if self.watching { "watching" } else { "idle" },
            watching: self.watching,
            verbose: self.verbose,
            seen: self.seen.len(),
            stats: self.stats.clone(),
            started_at: self.started_at,
            last_cycle_at: self.last_cycle_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
        }
    }

    fn record_cycle(&mut self, report: &CycleReport) {
        self.stats.cycles += 1;
        self.last_cycle_at = Some(Utc::now());
        for category in &report.categories {
            self.stats.candidates += category.candidates as u64;
            self.stats.qualifying += category.qualifying as u64;
            self.stats.alerts_sent += category.sent as u64;
            self.stats.suppressed += category.suppressed as u64;
            self.stats.send_failures += category.send_failures as u64;
            if category.error.is_some() {
                self.stats.fetch_failures += 1;
            }
        }
    }
}

/// Shared handle to the session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(watching: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState::new(watching))),
        }
    }

    /// Run `f` with the state locked.
    pub async fn with<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.inner.lock().await;
        f(&mut state)
    }

    pub async fn is_watching(&self) -> bool {
        self.inner.lock().await.watching
    }

    pub async fn is_verbose(&self) -> bool {
        self.inner.lock().await.verbose
    }

    /// Claim `key` for sending. `false` means it was claimed before.
    pub async fn claim(&self, key: AlertKey) -> bool {
        self.inner.lock().await.seen.insert(key)
    }

    pub async fn release(&self, key: &AlertKey) {
        self.inner.lock().await.seen.remove(key);
    }

    /// Forget every alerted key. Returns how many were dropped.
    pub async fn reset_seen(&self) -> usize {
        self.inner.lock().await.seen.clear()
    }

    pub async fn record_cycle(&self, report: &CycleReport) -> u64 {
        let mut state = self.inner.lock().await;
        state.record_cycle(report);
        state.stats.cycles
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }
}
