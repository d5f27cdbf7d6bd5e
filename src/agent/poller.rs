use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::agent::session::Session;
use crate::alerts::notifier::{Notifier, NotifyOutcome};
use crate::alerts::AlertSink;
use crate::config::{AppConfig, CategoryTarget};
use crate::extract::Extractor;
use crate::feed::models::Category;
use crate::rules::RuleSet;
use crate::source::PageSource;

/// Outcome of one category within a cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub blocks: usize,
    pub candidates: usize,
    pub qualifying: usize,
    pub sent: usize,
    pub suppressed: usize,
    pub send_failures: usize,
    /// Retrieval failure, if the page could not be fetched.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub duration_ms: u64,
    pub categories: Vec<CategoryReport>,
}

impl CycleReport {
    pub fn has_failures(&self) -> bool {
        self.categories
            .iter()
            .any(|c| c.error.is_some() || c.send_failures > 0)
    }

    /// Short human summary sent to the chat in verbose mode.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Cycle {} ({} ms)", self.cycle, self.duration_ms)];
        for c in &self.categories {
            let line = match &c.error {
                Some(error) => format!("{}: fetch failed: {error}", c.category),
                None => format!(
                    "{}: {} rows, {} candidates, {} qualifying, {} sent, {} suppressed, {} send failures",
                    c.category, c.blocks, c.candidates, c.qualifying, c.sent, c.suppressed, c.send_failures
                ),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Fetch → extract → filter → notify, once per tick.
pub struct Poller {
    source: Box<dyn PageSource>,
    extractor: Extractor,
    rules: RuleSet,
    notifier: Notifier,
    diagnostics: Arc<dyn AlertSink>,
    session: Session,
    targets: Vec<CategoryTarget>,
}

impl Poller {
    pub fn new(
        config: &AppConfig,
        source: Box<dyn PageSource>,
        sink: Arc<dyn AlertSink>,
        session: Session,
    ) -> Result<Self> {
        let notifier = Notifier::new(sink.clone(), session.clone(), config.alerts.on_send_failure);

        info!(
            source = source.name(),
            categories = config.categories.len(),
            score_pick = ?config.extraction.score_pick,
            on_send_failure = ?config.alerts.on_send_failure,
            "Poller initialized"
        );

        Ok(Self {
            source,
            extractor: Extractor::new(&config.extraction)?,
            rules: RuleSet::new(config.rules.clone()),
            notifier,
            diagnostics: sink,
            session,
            targets: config.categories.clone(),
        })
    }

    /// Tick loop. Cycles run inside this task one after another; ticks
    /// missed while a cycle is still running are skipped, not queued.
    pub async fn run(&self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One timer tick: a full cycle while watching, nothing while idle.
    pub async fn tick(&self) -> Option<CycleReport> {
        if !self.session.is_watching().await {
            debug!("Idle, tick skipped");
            return None;
        }
        Some(self.run_cycle().await)
    }

    /// Run every category once, regardless of the watching flag.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport::default();

        for target in &self.targets {
            report.categories.push(self.run_category(target).await);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.cycle = self.session.record_cycle(&report).await;

        info!(
            cycle = report.cycle,
            duration_ms = report.duration_ms,
            sent = report.categories.iter().map(|c| c.sent).sum::<usize>(),
            failures = report.has_failures(),
            "Cycle complete"
        );

        if self.session.is_verbose().await {
            if let Err(e) = self.diagnostics.send(&report.summary()).await {
                warn!(error = %e, "Failed to send diagnostics");
            }
        }

        report
    }

    async fn run_category(&self, target: &CategoryTarget) -> CategoryReport {
        let mut report = CategoryReport {
            category: target.category,
            ..Default::default()
        };

        let doc = match self.source.fetch(target).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(category = %target.category, source = self.source.name(), error = %e, "Fetch failed, skipping category");
                report.error = Some(e.to_string());
                return report;
            }
        };

        let candidates = self.extractor.extract(&doc);
        report.blocks = candidates.block_count();

        for candidate in candidates.iter() {
            report.candidates += 1;

            let rule = self.rules.rule_for(&candidate);
            if !rule.qualifies(&candidate) {
                continue;
            }
            report.qualifying += 1;

            match self.notifier.notify(&candidate, rule.min_probability).await {
                Ok(NotifyOutcome::Sent) => report.sent += 1,
                Ok(NotifyOutcome::Suppressed) => report.suppressed += 1,
                Err(_) => report.send_failures += 1,
            }
        }

        debug!(
            category = %target.category,
            blocks = report.blocks,
            candidates = report.candidates,
            qualifying = report.qualifying,
            "Category processed"
        );
        report
    }
}
