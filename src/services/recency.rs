use std::sync::Arc;
use std::time::Duration;

use crate::models::ParticipantId;
use crate::services::store::{SharedStore, StoreError, StoreKey};

/// Default cooldown before two former partners can meet again
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(20 * 60);

/// Default cap on remembered partners per participant
pub const DEFAULT_MAX_PARTNERS: usize = 100;

/// Short-lived record of who each participant was recently paired with
#[derive(Clone)]
pub struct RecencyGuard {
    store: Arc<dyn SharedStore>,
    keys: StoreKey,
    cooldown: Duration,
    max_partners: usize,
}

impl RecencyGuard {
    pub fn new(store: Arc<dyn SharedStore>, keys: StoreKey, cooldown: Duration, max_partners: usize) -> Self {
        Self {
            store,
            keys,
            cooldown,
            max_partners,
        }
    }

    /// Whether `candidate` is in `id`'s recent partner list
    pub async fn is_recent_partner(&self, id: &ParticipantId, candidate: &ParticipantId) -> Result<bool, StoreError> {
        let pos = self.store.position(&self.keys.recent(id), candidate.as_str()).await?;
        Ok(pos.is_some())
    }

    /// Record a finalized pairing on both sides and restart both cooldowns
    ///
    /// Only call this after the pair is registered; a recorded pairing that
    /// never happened would block two strangers from meeting.
    pub async fn record(&self, a: &ParticipantId, b: &ParticipantId) -> Result<(), StoreError> {
        self.append(a, b).await?;
        self.append(b, a).await?;
        tracing::trace!("Recorded recent partners {} <-> {}", a, b);
        Ok(())
    }

    async fn append(&self, id: &ParticipantId, partner: &ParticipantId) -> Result<(), StoreError> {
        let key = self.keys.recent(id);
        self.store.push_back(&key, partner.as_str()).await?;
        self.store.trim_to_newest(&key, self.max_partners).await?;
        self.store.expire(&key, self.cooldown).await
    }

    /// Recent partners of `id`, oldest first
    pub async fn partners(&self, id: &ParticipantId) -> Result<Vec<ParticipantId>, StoreError> {
        let ids = self.store.range(&self.keys.recent(id), usize::MAX).await?;
        Ok(ids.into_iter().map(ParticipantId::from).collect())
    }
}
