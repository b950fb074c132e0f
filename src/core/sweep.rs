use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::core::engine::{MatchEngine, MatchError};
use crate::models::Tier;

/// Counters from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Distinct participants found waiting
    pub scanned: usize,
    /// Pairs formed during the pass
    pub paired: usize,
    /// Waiting entries of participants that were already paired
    pub stale: usize,
}

/// Periodically re-runs search for everyone waiting
///
/// Participants who queued while nobody suitable was around get matched
/// here once a partner shows up, without having to search again.
pub struct BackgroundSweep {
    engine: Arc<MatchEngine>,
    interval: Duration,
}

impl BackgroundSweep {
    pub fn new(engine: Arc<MatchEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run a single pass over all tiers
    pub async fn run_once(&self) -> Result<SweepReport, MatchError> {
        let queues = self.engine.queues();

        let mut seen = HashSet::new();
        let mut waiting = Vec::new();
        for tier in Tier::ALL {
            for id in queues.snapshot(tier).await? {
                if seen.insert(id.clone()) {
                    waiting.push((tier, id));
                }
            }
        }

        let mut report = SweepReport {
            scanned: waiting.len(),
            ..SweepReport::default()
        };

        for (tier, id) in waiting {
            // Left the queue, or got paired earlier in this pass
            if queues.locate(&id).await?.is_none() {
                continue;
            }

            if self.engine.partner(&id).await?.is_some() {
                self.engine.dequeue(&id).await?;
                report.stale += 1;
                continue;
            }

            // Keep whatever preference the participant queued with
            if self.engine.search(&id, tier.implied_preference()).await.is_some() {
                report.paired += 1;
            }
        }

        Ok(report)
    }

    /// Sweep every interval until `shutdown` flips to true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Background sweep started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let pass = uuid::Uuid::new_v4();
                    match self.run_once().await {
                        Ok(report) if report.scanned > 0 => tracing::info!(
                            "Sweep {}: scanned {}, paired {}, stale {}",
                            pass,
                            report.scanned,
                            report.paired,
                            report.stale
                        ),
                        Ok(_) => tracing::trace!("Sweep {}: queues empty", pass),
                        Err(e) => tracing::warn!("Sweep {} failed: {}", pass, e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Background sweep stopped");
    }
}
