use std::sync::Arc;

use crate::models::{ParticipantId, Tier};
use crate::services::store::{SharedStore, StoreError, StoreKey};

/// Tiered waiting lists of participant identifiers
///
/// Each tier is one store list: new arrivals are pushed to the tail and
/// candidates are claimed from the head. This component does not enforce
/// single-tier membership; the match engine checks `locate` before
/// enqueueing and calls `remove_everywhere` after a pairing.
#[derive(Clone)]
pub struct QueueStore {
    store: Arc<dyn SharedStore>,
    keys: StoreKey,
}

impl QueueStore {
    pub fn new(store: Arc<dyn SharedStore>, keys: StoreKey) -> Self {
        Self { store, keys }
    }

    /// Push `id` to the tail of `tier`
    pub async fn enqueue(&self, tier: Tier, id: &ParticipantId) -> Result<(), StoreError> {
        let len = self.store.push_back(&self.keys.queue(tier), id.as_str()).await?;
        tracing::debug!("Enqueued {} in {} (depth {})", id, tier, len);
        Ok(())
    }

    /// Up to `n` identifiers from the head, without removing them
    pub async fn peek(&self, tier: Tier, n: usize) -> Result<Vec<ParticipantId>, StoreError> {
        let ids = self.store.range(&self.keys.queue(tier), n).await?;
        Ok(ids.into_iter().map(ParticipantId::from).collect())
    }

    /// Every identifier currently waiting in `tier`, head first
    pub async fn snapshot(&self, tier: Tier) -> Result<Vec<ParticipantId>, StoreError> {
        self.peek(tier, usize::MAX).await
    }

    /// Atomically pop one identifier from the head
    pub async fn claim(&self, tier: Tier) -> Result<Option<ParticipantId>, StoreError> {
        let id = self.store.pop_front(&self.keys.queue(tier)).await?;
        Ok(id.map(ParticipantId::from))
    }

    /// Return a rejected candidate to the tail
    pub async fn requeue(&self, tier: Tier, id: &ParticipantId) -> Result<(), StoreError> {
        self.store.push_back(&self.keys.queue(tier), id.as_str()).await?;
        Ok(())
    }

    /// Return a claimed but unevaluated candidate to the head, keeping its place
    pub async fn restore(&self, tier: Tier, id: &ParticipantId) -> Result<(), StoreError> {
        self.store.push_front(&self.keys.queue(tier), id.as_str()).await?;
        Ok(())
    }

    /// Remove every occurrence of `id` from every tier. Returns the number removed.
    pub async fn remove_everywhere(&self, id: &ParticipantId) -> Result<usize, StoreError> {
        let mut removed = 0;
        for tier in Tier::ALL {
            removed += self.store.remove_all(&self.keys.queue(tier), id.as_str()).await?;
        }
        if removed > 0 {
            tracing::debug!("Removed {} queue entries for {}", removed, id);
        }
        Ok(removed)
    }

    /// First tier currently holding `id`
    pub async fn locate(&self, id: &ParticipantId) -> Result<Option<Tier>, StoreError> {
        for tier in Tier::ALL {
            if self.store.position(&self.keys.queue(tier), id.as_str()).await?.is_some() {
                return Ok(Some(tier));
            }
        }
        Ok(None)
    }

    pub async fn len(&self, tier: Tier) -> Result<usize, StoreError> {
        self.store.len(&self.keys.queue(tier)).await
    }

    /// Depth of every tier
    pub async fn depths(&self) -> Result<Vec<(Tier, usize)>, StoreError> {
        let mut depths = Vec::with_capacity(Tier::ALL.len());
        for tier in Tier::ALL {
            depths.push((tier, self.len(tier).await?));
        }
        Ok(depths)
    }
}
