//! Run report

use alerting::{AlertState, Transition};
use serde::Serialize;
use uuid::Uuid;

/// What happened to one entity's decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    NoAction,
    Sent,
    /// Send failed; state withheld so the notice is retried next run
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub entity: String,
    pub previous: AlertState,
    pub transition: Transition,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

/// Reviewable summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub rows_fetched: usize,
    pub rows_skipped: usize,
    pub alerts_raised: usize,
    pub resolutions_raised: usize,
    pub no_action: usize,
    pub notifications_attempted: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub entities_pruned: usize,
    /// Ledger was unreadable and the run started empty
    pub store_reset: bool,
    pub quarantined_to: Option<String>,
    pub committed: bool,
    pub decisions: Vec<DecisionRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            rows_fetched: 0,
            rows_skipped: 0,
            alerts_raised: 0,
            resolutions_raised: 0,
            no_action: 0,
            notifications_attempted: 0,
            notifications_sent: 0,
            notifications_failed: 0,
            entities_pruned: 0,
            store_reset: false,
            quarantined_to: None,
            committed: false,
            decisions: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Decisions that produced a notification attempt
    pub fn notified(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.decisions
            .iter()
            .filter(|d| d.transition != Transition::NoAction)
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "rows={} skipped={} alerts={} resolutions={} sent={}/{} failed={} committed={}",
            self.rows_fetched,
            self.rows_skipped,
            self.alerts_raised,
            self.resolutions_raised,
            self.notifications_sent,
            self.notifications_attempted,
            self.notifications_failed,
            self.committed
        )
    }
}
