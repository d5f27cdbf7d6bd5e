use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::agent::session::Session;
use crate::alerts::{AlertSink, NotificationError};
use crate::feed::models::MatchCandidate;

/// What happens to a claimed key when delivery fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendFailurePolicy {
    /// The key stays claimed and the alert is lost for the process lifetime.
    #[default]
    KeepKey,
    /// The key is released so a later cycle can try again.
    Rollback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// Key already claimed; nothing was sent.
    Suppressed,
}

pub struct Notifier {
    sink: Arc<dyn AlertSink>,
    session: Session,
    policy: SendFailurePolicy,
}

impl Notifier {
    pub fn new(sink: Arc<dyn AlertSink>, session: Session, policy: SendFailurePolicy) -> Self {
        Self {
            sink,
            session,
            policy,
        }
    }

    /// Alert on `candidate` unless its key was claimed before. The key is
    /// claimed before sending, so two callers can never both send it.
    pub async fn notify(
        &self,
        candidate: &MatchCandidate,
        min_probability: u8,
    ) -> Result<NotifyOutcome, NotificationError> {
        let key = candidate.alert_key();
        if !self.session.claim(key.clone()).await {
            return Ok(NotifyOutcome::Suppressed);
        }

        let text = format_alert(candidate, min_probability);
        match self.sink.send(&text).await {
            Ok(()) => {
                info!(key = %key, "Alert sent");
                Ok(NotifyOutcome::Sent)
            }
            Err(e) => {
                if self.policy == SendFailurePolicy::Rollback {
                    self.session.release(&key).await;
                }
                warn!(key = %key, policy = ?self.policy, error = %e, "Alert delivery failed");
                Err(e)
            }
        }
    }
}

pub fn format_alert(candidate: &MatchCandidate, min_probability: u8) -> String {
    format!(
        "🚨 ALERT {}\n\
         ⚽ {}\n\
         ⏱ Min {}'\n\
         🔢 {}\n\
         📊 Prob {}% (≥{}%)",
        candidate.category.headline(),
        candidate.display_name,
        candidate.minute,
        candidate.score,
        candidate.probability,
        min_probability,
    )
}
