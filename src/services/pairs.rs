use std::sync::Arc;
use std::time::Duration;

use crate::models::ParticipantId;
use crate::services::store::{SharedStore, StoreError, StoreKey};

/// Default lifetime of a pair entry; a backstop for chats nobody ends
pub const DEFAULT_PAIR_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of a pairing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// Both reciprocal entries were written
    Paired,
    /// The first participant already had a partner; nothing was written
    FirstTaken,
    /// The second participant already had a partner; the first entry was rolled back
    SecondTaken,
    /// Both entries were written but did not read back as reciprocal; both were rolled back
    Inconsistent,
}

impl PairOutcome {
    pub fn is_paired(self) -> bool {
        self == PairOutcome::Paired
    }
}

/// Participant → partner mapping, the single source of truth for "is paired"
///
/// # Pairing protocol
///
/// The store only offers single-key atomicity, so a pair is finalized with
/// an ordered two-phase claim:
///
/// 1. `SET pair:<a> <b> NX`. If it fails, `a` is already paired; abort.
/// 2. `SET pair:<b> <a> NX`. If it fails, `b` is already paired; delete
///    `pair:<a>` (only while it still holds `b`) and abort.
///
/// Every concurrent matcher goes through the same two conditional writes,
/// so at most one of them can own each participant's key and no participant
/// can end up with two partners. This is the only place a match becomes
/// final; reading both keys first and then writing both is not race-free.
#[derive(Clone)]
pub struct PairRegistry {
    store: Arc<dyn SharedStore>,
    keys: StoreKey,
    ttl: Duration,
}

impl PairRegistry {
    pub fn new(store: Arc<dyn SharedStore>, keys: StoreKey, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    /// Pair `a` with `b` if neither is currently paired
    pub async fn try_pair(&self, a: &ParticipantId, b: &ParticipantId) -> Result<PairOutcome, StoreError> {
        if a == b {
            return Ok(PairOutcome::SecondTaken);
        }

        let key_a = self.keys.pair(a);
        let key_b = self.keys.pair(b);

        let first = match self.store.set_if_absent(&key_a, b.as_str(), self.ttl).await {
            Ok(written) => written,
            Err(e) => {
                self.release(&key_a, b).await;
                return Err(e);
            }
        };
        if !first {
            return Ok(PairOutcome::FirstTaken);
        }

        let second = match self.store.set_if_absent(&key_b, a.as_str(), self.ttl).await {
            Ok(written) => written,
            Err(e) => {
                // The write may have landed before the error; release both sides
                self.release(&key_a, b).await;
                self.release(&key_b, a).await;
                return Err(e);
            }
        };
        if !second {
            self.release(&key_a, b).await;
            return Ok(PairOutcome::SecondTaken);
        }

        // Read back both sides before declaring success
        let (partner_of_a, partner_of_b) = match self.read_back(&key_a, &key_b).await {
            Ok(partners) => partners,
            Err(e) => {
                tracing::warn!("Could not verify pair {} <-> {}, rolling back: {}", a, b, e);
                self.release(&key_a, b).await;
                self.release(&key_b, a).await;
                return Err(e);
            }
        };

        if partner_of_a.as_deref() != Some(b.as_str()) || partner_of_b.as_deref() != Some(a.as_str()) {
            tracing::error!(
                "Inconsistent pair state after pairing {} <-> {}: pair:{}={:?}, pair:{}={:?}; rolling back",
                a,
                b,
                a,
                partner_of_a,
                b,
                partner_of_b
            );
            self.release(&key_a, b).await;
            self.release(&key_b, a).await;
            return Ok(PairOutcome::Inconsistent);
        }

        Ok(PairOutcome::Paired)
    }

    async fn read_back(&self, key_a: &str, key_b: &str) -> Result<(Option<String>, Option<String>), StoreError> {
        let partner_of_a = self.store.get(key_a).await?;
        let partner_of_b = self.store.get(key_b).await?;
        Ok((partner_of_a, partner_of_b))
    }

    /// Best-effort compare-and-delete used for rollbacks
    async fn release(&self, key: &str, expected: &ParticipantId) {
        if let Err(e) = self.store.delete_if_equals(key, expected.as_str()).await {
            tracing::warn!("Failed to roll back {}: {}", key, e);
        }
    }

    /// Current partner of `id`
    pub async fn partner(&self, id: &ParticipantId) -> Result<Option<ParticipantId>, StoreError> {
        let partner = self.store.get(&self.keys.pair(id)).await?;
        Ok(partner.map(ParticipantId::from))
    }

    /// Delete both reciprocal entries. Idempotent; returns the former partner.
    pub async fn unpair(&self, id: &ParticipantId) -> Result<Option<ParticipantId>, StoreError> {
        let Some(partner) = self.partner(id).await? else {
            return Ok(None);
        };

        self.store.delete_if_equals(&self.keys.pair(id), partner.as_str()).await?;
        // The partner may already be in a new pair if its entry expired first
        self.store.delete_if_equals(&self.keys.pair(&partner), id.as_str()).await?;

        tracing::debug!("Unpaired {} <-> {}", id, partner);
        Ok(Some(partner))
    }
}
