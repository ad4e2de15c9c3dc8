//! Run Coordinator Implementation

use crate::config::{AbsentEntityPolicy, CorruptStorePolicy, RunConfig};
use crate::error::RunError;
use crate::report::{DecisionRecord, Outcome, RunReport, SkippedRow};
use alerting::{AlertState, NotificationIntent, Transition};
use notifier::{Transport, TransportError};
use row_normalizer::{EntityId, NormalizerConfig, RowNormalizer};
use sheet_source::{DataSource, SourceError};
use std::collections::HashSet;
use std::sync::Arc;
use storage::{AlertLedger, StateStore, StorageError};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Drives one alert pass. Collaborators are injected so every seam can be
/// replaced in tests.
pub struct RunCoordinator {
    store: Arc<dyn StateStore>,
    source: Arc<dyn DataSource>,
    transport: Arc<dyn Transport>,
    normalizer: RowNormalizer,
    config: RunConfig,
}

impl RunCoordinator {
    pub fn new(
        store: Arc<dyn StateStore>,
        source: Arc<dyn DataSource>,
        transport: Arc<dyn Transport>,
        normalizer: NormalizerConfig,
        config: RunConfig,
    ) -> Self {
        info!(
            "Creating run coordinator: store={} source={} transport={}",
            store.location(),
            source.describe(),
            transport.describe()
        );
        Self {
            store,
            source,
            transport,
            normalizer: RowNormalizer::new(normalizer),
            config,
        }
    }

    /// Execute one run. `Err` means nothing was committed.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunReport, RunError> {
        let mut report = RunReport::new(run_id);

        // Held until the run returns
        let _lock = self.store.lock()?;

        let mut ledger = self.load_ledger(&mut report)?;

        let fetch = tokio::time::timeout(self.config.fetch_timeout(), self.source.fetch_rows());
        let records = match fetch.await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                error!("Fetching {} failed: {}", self.source.describe(), e);
                return Err(RunError::SourceUnavailable(e));
            }
            Err(_) => {
                error!("Fetching {} timed out", self.source.describe());
                return Err(RunError::SourceUnavailable(SourceError::Unavailable(format!(
                    "fetch timed out after {:?}",
                    self.config.fetch_timeout()
                ))));
            }
        };
        report.rows_fetched = records.len();

        let (snapshots, rejected) = self.normalizer.normalize_feed(&records);
        for err in rejected {
            warn!(row = err.row(), "Skipping row: {}", err);
            report.skipped.push(SkippedRow {
                row: err.row(),
                reason: err.to_string(),
            });
        }
        report.rows_skipped = report.skipped.len();

        let mut intents = Vec::new();
        for snapshot in &snapshots {
            let previous = ledger.get(&snapshot.entity).copied().unwrap_or_default();
            let Some(intent) = NotificationIntent::plan(previous, snapshot) else {
                report.no_action += 1;
                self.record(
                    &mut report,
                    snapshot.entity.to_string(),
                    previous,
                    Transition::NoAction,
                    Outcome::NoAction,
                );
                continue;
            };
            if intent.transition == Transition::RaiseAlert {
                report.alerts_raised += 1;
            } else {
                report.resolutions_raised += 1;
            }
            intents.push(intent);
        }

        // Sent intents only; a failed send leaves the entity's previous state
        let mut delivered = Vec::with_capacity(intents.len());
        for intent in intents {
            report.notifications_attempted += 1;
            let outcome = match self.send(&intent).await {
                Ok(()) => {
                    report.notifications_sent += 1;
                    delivered.push((intent.entity.clone(), intent.new_state));
                    Outcome::Sent
                }
                Err(e) => {
                    report.notifications_failed += 1;
                    warn!(
                        entity = %intent.entity,
                        "Notification failed, will retry next run: {}", e
                    );
                    Outcome::Failed { error: e.to_string() }
                }
            };
            self.record(
                &mut report,
                intent.entity.to_string(),
                intent.previous,
                intent.transition,
                outcome,
            );
        }

        if snapshots.is_empty() {
            warn!("Feed produced no usable rows, leaving the ledger untouched");
            self.emit_metrics(&report);
            info!("Run finished: {}", report.summary());
            return Ok(report);
        }

        for (entity, state) in delivered {
            ledger.insert(entity, state);
        }

        if self.config.absent_entity_policy == AbsentEntityPolicy::Prune {
            let present: HashSet<&EntityId> = snapshots.iter().map(|s| &s.entity).collect();
            let before = ledger.len();
            ledger.retain(|entity, _| present.contains(entity));
            report.entities_pruned = before - ledger.len();
            if report.entities_pruned > 0 {
                info!("Pruned {} entities absent from the feed", report.entities_pruned);
            }
        }

        if self.config.commit {
            if report.store_reset {
                report.quarantined_to = self
                    .store
                    .quarantine()
                    .map_err(RunError::Store)?
                    .map(|path| path.display().to_string());
            }
            self.store.commit(&ledger).map_err(RunError::Store)?;
            report.committed = true;
            debug!("Committed {} ledger entries", ledger.len());
        } else {
            info!("Commit disabled, ledger left untouched");
        }

        self.emit_metrics(&report);
        info!("Run finished: {}", report.summary());
        Ok(report)
    }

    /// Load the ledger, applying the corrupt-store policy
    fn load_ledger(&self, report: &mut RunReport) -> Result<AlertLedger, RunError> {
        match self.store.load() {
            Ok(ledger) => {
                debug!("Loaded ledger with {} entries", ledger.len());
                Ok(ledger)
            }
            Err(e @ StorageError::Corrupt { .. }) => match self.config.corrupt_store_policy {
                CorruptStorePolicy::Abort => {
                    error!("{}; aborting run (corrupt_store_policy = abort)", e);
                    Err(RunError::StoreCorrupt(e))
                }
                CorruptStorePolicy::Reset => {
                    warn!(
                        "{}; starting from an empty ledger (corrupt_store_policy = reset). \
                         Open alerts may be announced again.",
                        e
                    );
                    report.store_reset = true;
                    Ok(AlertLedger::new())
                }
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&self, intent: &NotificationIntent) -> Result<(), TransportError> {
        let timeout = self.config.send_timeout();
        match tokio::time::timeout(timeout, self.transport.send(&intent.text())).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
        }
    }

    fn record(
        &self,
        report: &mut RunReport,
        entity: String,
        previous: AlertState,
        transition: Transition,
        outcome: Outcome,
    ) {
        match &outcome {
            Outcome::Failed { error } => warn!(
                entity = %entity,
                %previous,
                %transition,
                outcome = "failed",
                error = %error,
                "Decision"
            ),
            Outcome::Sent => {
                info!(entity = %entity, %previous, %transition, outcome = "sent", "Decision")
            }
            Outcome::NoAction => {
                debug!(entity = %entity, %previous, %transition, outcome = "no_action", "Decision")
            }
        }
        report.decisions.push(DecisionRecord {
            entity,
            previous,
            transition,
            outcome,
        });
    }

    fn emit_metrics(&self, report: &RunReport) {
        metrics::counter!("hazard_monitor_rows_total").increment(report.rows_fetched as u64);
        metrics::counter!("hazard_monitor_rows_skipped_total")
            .increment(report.rows_skipped as u64);
        metrics::counter!("hazard_monitor_notifications_sent_total")
            .increment(report.notifications_sent as u64);
        metrics::counter!("hazard_monitor_notifications_failed_total")
            .increment(report.notifications_failed as u64);
    }
}
