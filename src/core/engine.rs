use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::filters::{check_candidate, Rejection};
use crate::core::seeker::Seeker;
use crate::models::{GenderPreference, ParticipantId, Tier};
use crate::services::{
    pairs, recency, PairOutcome, PairRegistry, PreferenceResolver, ProfileError, QueueStore, RecencyGuard,
    SharedStore, StoreError, StoreKey,
};

/// Errors that can occur while matching
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Profile lookup failed: {0}")]
    Profile(#[from] ProfileError),
}

/// Tunables for the match engine
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Upper bound on claims per tier per search
    pub max_attempts: usize,
    /// Warm the resolver cache with the head of each tier before scanning it
    pub prefetch: bool,
    pub pair_ttl: Duration,
    pub recent_cooldown: Duration,
    pub recent_max_partners: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            prefetch: true,
            pair_ttl: pairs::DEFAULT_PAIR_TTL,
            recent_cooldown: recency::DEFAULT_COOLDOWN,
            recent_max_partners: recency::DEFAULT_MAX_PARTNERS,
        }
    }
}

/// Result of asking to join the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued(Tier),
    AlreadyQueued(Tier),
    AlreadyPaired(ParticipantId),
    Ineligible,
}

impl EnqueueOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnqueueOutcome::Queued(_) => "queued",
            EnqueueOutcome::AlreadyQueued(_) => "already_queued",
            EnqueueOutcome::AlreadyPaired(_) => "already_paired",
            EnqueueOutcome::Ineligible => "ineligible",
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            EnqueueOutcome::Queued(tier) | EnqueueOutcome::AlreadyQueued(tier) => Some(*tier),
            _ => None,
        }
    }
}

/// How scanning one tier ended
enum TierScan {
    Paired(ParticipantId),
    Exhausted,
    /// The seeker got paired by someone else mid-search
    SeekerTaken,
    /// Pairing hit an invariant violation and was rolled back
    Aborted,
}

/// Tiered matchmaking engine
///
/// All coordination goes through the shared store: any number of engines,
/// in any number of processes, can search concurrently. Queue operations are
/// allowed to race; a match only becomes final through
/// [`PairRegistry::try_pair`].
#[derive(Clone)]
pub struct MatchEngine {
    queues: QueueStore,
    recency: RecencyGuard,
    pairs: PairRegistry,
    resolver: PreferenceResolver,
    config: EngineConfig,
}

impl MatchEngine {
    pub fn new(store: Arc<dyn SharedStore>, keys: StoreKey, resolver: PreferenceResolver, config: EngineConfig) -> Self {
        Self {
            queues: QueueStore::new(store.clone(), keys.clone()),
            recency: RecencyGuard::new(
                store.clone(),
                keys.clone(),
                config.recent_cooldown,
                config.recent_max_partners,
            ),
            pairs: PairRegistry::new(store, keys, config.pair_ttl),
            resolver,
            config,
        }
    }

    pub fn queues(&self) -> &QueueStore {
        &self.queues
    }

    pub fn recency(&self) -> &RecencyGuard {
        &self.recency
    }

    pub fn pairs(&self) -> &PairRegistry {
        &self.pairs
    }

    /// Search for a partner for `id`
    ///
    /// Returns the new partner, or `None` if nobody suitable was found (the
    /// participant is then queued) or anything went wrong. Callers should
    /// check [`MatchEngine::partner`] first; an already paired participant
    /// is not special-cased here.
    pub async fn search(&self, id: &ParticipantId, explicit: Option<GenderPreference>) -> Option<ParticipantId> {
        match self.try_search(id, explicit).await {
            Ok(partner) => partner,
            Err(e) => {
                tracing::warn!("Search for {} failed, no match this round: {}", id, e);
                None
            }
        }
    }

    /// Like [`MatchEngine::search`], but reports store and profile failures
    pub async fn try_search(
        &self,
        id: &ParticipantId,
        explicit: Option<GenderPreference>,
    ) -> Result<Option<ParticipantId>, MatchError> {
        let Some(seeker) = self.resolve_seeker(id, explicit).await? else {
            return Ok(None);
        };

        for tier in seeker.search_order() {
            match self.scan_tier(&seeker, tier).await? {
                TierScan::Paired(partner) => return Ok(Some(partner)),
                TierScan::Exhausted => continue,
                TierScan::SeekerTaken => return Ok(None),
                TierScan::Aborted => break,
            }
        }

        self.enqueue_seeker(&seeker).await?;
        Ok(None)
    }

    /// Join the queue without searching
    pub async fn enqueue(&self, id: &ParticipantId) -> Result<EnqueueOutcome, MatchError> {
        self.enqueue_with(id, None).await
    }

    /// Join the queue with a one-off gender preference
    pub async fn enqueue_with(
        &self,
        id: &ParticipantId,
        explicit: Option<GenderPreference>,
    ) -> Result<EnqueueOutcome, MatchError> {
        if let Some(partner) = self.pairs.partner(id).await? {
            return Ok(EnqueueOutcome::AlreadyPaired(partner));
        }

        match self.resolve_seeker(id, explicit).await? {
            Some(seeker) => self.enqueue_seeker(&seeker).await,
            None => Ok(EnqueueOutcome::Ineligible),
        }
    }

    /// Leave every queue. Safe to call at any time; returns the number of entries removed.
    pub async fn dequeue(&self, id: &ParticipantId) -> Result<usize, MatchError> {
        Ok(self.queues.remove_everywhere(id).await?)
    }

    pub async fn partner(&self, id: &ParticipantId) -> Result<Option<ParticipantId>, MatchError> {
        Ok(self.pairs.partner(id).await?)
    }

    /// End the current pairing, if any. Returns the former partner.
    pub async fn unpair(&self, id: &ParticipantId) -> Result<Option<ParticipantId>, MatchError> {
        let former = self.pairs.unpair(id).await?;
        if let Some(partner) = &former {
            tracing::info!("Pair {} <-> {} ended", id, partner);
        }
        Ok(former)
    }

    pub async fn queue_depths(&self) -> Result<Vec<(Tier, usize)>, MatchError> {
        Ok(self.queues.depths().await?)
    }

    /// Resolve the searching participant; `None` if they may not match right now
    async fn resolve_seeker(
        &self,
        id: &ParticipantId,
        explicit: Option<GenderPreference>,
    ) -> Result<Option<Seeker>, MatchError> {
        let Some(profile) = self.resolver.resolve(id).await? else {
            tracing::debug!("Unknown participant {}, not matching", id);
            return Ok(None);
        };

        if profile.banned {
            let removed = self.queues.remove_everywhere(id).await?;
            tracing::info!("Banned participant {} not matched ({} queue entries removed)", id, removed);
            return Ok(None);
        }

        let seeker = Seeker::from_profile(&profile, explicit);
        if seeker.is_none() {
            tracing::debug!("Participant {} has an incomplete profile, not matching", id);
        }
        Ok(seeker)
    }

    /// Put the seeker in its tier unless it already waits somewhere
    async fn enqueue_seeker(&self, seeker: &Seeker) -> Result<EnqueueOutcome, MatchError> {
        match self.queues.locate(&seeker.id).await? {
            Some(tier) if tier == seeker.tier => return Ok(EnqueueOutcome::AlreadyQueued(tier)),
            Some(tier) => {
                // Subscription or preference changed since the participant queued
                tracing::debug!("Moving {} from {} to {}", seeker.id, tier, seeker.tier);
                self.queues.remove_everywhere(&seeker.id).await?;
            }
            None => {}
        }

        self.queues.enqueue(seeker.tier, &seeker.id).await?;
        Ok(EnqueueOutcome::Queued(seeker.tier))
    }

    /// Bounded claim-and-test loop over one tier
    async fn scan_tier(&self, seeker: &Seeker, tier: Tier) -> Result<TierScan, MatchError> {
        let budget = self.queues.len(tier).await?.min(self.config.max_attempts);
        if budget == 0 {
            return Ok(TierScan::Exhausted);
        }

        if self.config.prefetch {
            let upcoming = self.queues.peek(tier, budget).await?;
            self.resolver.prefetch(&upcoming).await;
        }

        for attempt in 1..=budget {
            let Some(candidate) = self.queues.claim(tier).await? else {
                break;
            };

            if let Err(rejection) = self.evaluate(seeker, &candidate, tier).await {
                if rejection.keeps_place() {
                    self.queues.requeue(tier, &candidate).await?;
                }
                tracing::debug!(
                    "{} skipped {} in {} ({}, attempt {}/{})",
                    seeker.id,
                    candidate,
                    tier,
                    rejection,
                    attempt,
                    budget
                );
                continue;
            }

            let outcome = match self.pairs.try_pair(&seeker.id, &candidate).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The candidate was claimed but not paired by us
                    if let Err(restore_err) = self.queues.restore(tier, &candidate).await {
                        tracing::warn!("Lost queue entry for {}: {}", candidate, restore_err);
                    }
                    return Err(e.into());
                }
            };

            match outcome {
                PairOutcome::Paired => {
                    self.finalize(seeker, &candidate, tier).await;
                    return Ok(TierScan::Paired(candidate));
                }
                PairOutcome::SecondTaken => {
                    // Paired elsewhere in the meantime; its queue entry is rightly gone
                    tracing::debug!("{} was paired concurrently, not requeued", candidate);
                }
                PairOutcome::FirstTaken => {
                    self.queues.restore(tier, &candidate).await?;
                    tracing::debug!("{} was paired while searching; returned {} to {}", seeker.id, candidate, tier);
                    return Ok(TierScan::SeekerTaken);
                }
                PairOutcome::Inconsistent => {
                    self.queues.requeue(tier, &candidate).await?;
                    tracing::error!("Pairing {} <-> {} rolled back after an inconsistent read", seeker.id, candidate);
                    return Ok(TierScan::Aborted);
                }
            }
        }

        Ok(TierScan::Exhausted)
    }

    /// Decide whether a claimed candidate suits the seeker
    async fn evaluate(&self, seeker: &Seeker, candidate: &ParticipantId, tier: Tier) -> Result<(), Rejection> {
        if *candidate == seeker.id {
            return Err(Rejection::SelfMatch);
        }

        let profile = match self.resolver.resolve(candidate).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return Err(Rejection::IncompleteProfile),
            Err(e) => {
                tracing::warn!("Could not resolve candidate {}: {}", candidate, e);
                return Err(Rejection::Unresolved);
            }
        };

        check_candidate(seeker, &profile, tier)?;

        match self.recency.is_recent_partner(&seeker.id, candidate).await {
            Ok(false) => Ok(()),
            Ok(true) => Err(Rejection::RecentPartner),
            Err(e) => {
                tracing::warn!("Recency check for {} failed: {}", candidate, e);
                Err(Rejection::Unresolved)
            }
        }
    }

    /// Post-pairing cleanup; the pair itself is already final
    async fn finalize(&self, seeker: &Seeker, candidate: &ParticipantId, tier: Tier) {
        for id in [candidate, &seeker.id] {
            if let Err(e) = self.queues.remove_everywhere(id).await {
                tracing::warn!("Failed to clear queue entries of paired {}: {}", id, e);
            }
        }

        if let Err(e) = self.recency.record(&seeker.id, candidate).await {
            tracing::warn!("Failed to record recent partners {} <-> {}: {}", seeker.id, candidate, e);
        }

        tracing::info!("Paired {} with {} from {}", seeker.id, candidate, tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use crate::services::testing::FaultyStore;
    use crate::services::{MemoryStore, StaticProfileDirectory};

    fn engine() -> (MatchEngine, Arc<StaticProfileDirectory>) {
        engine_over(Arc::new(MemoryStore::new()))
    }

    fn engine_over(store: Arc<dyn SharedStore>) -> (MatchEngine, Arc<StaticProfileDirectory>) {
        let directory = Arc::new(StaticProfileDirectory::new());
        let engine = MatchEngine::new(
            store,
            StoreKey::default(),
            PreferenceResolver::new(directory.clone()),
            EngineConfig::default(),
        );
        (engine, directory)
    }

    #[tokio::test]
    async fn test_search_without_candidates_enqueues_once() {
        let (engine, dir) = engine();
        let a = dir.add_free("a", Gender::Male);

        assert_eq!(engine.search(&a, None).await, None);
        assert_eq!(engine.search(&a, None).await, None);

        assert_eq!(engine.queues().snapshot(Tier::Free).await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn test_search_pairs_and_clears_queues() {
        let (engine, dir) = engine();
        let a = dir.add_free("a", Gender::Male);
        let b = dir.add_free("b", Gender::Female);

        engine.search(&a, None).await;
        assert_eq!(engine.search(&b, None).await, Some(a.clone()));

        assert_eq!(engine.partner(&a).await.unwrap(), Some(b.clone()));
        assert_eq!(engine.partner(&b).await.unwrap(), Some(a.clone()));
        assert!(engine.recency().is_recent_partner(&a, &b).await.unwrap());
        assert_eq!(engine.queues().locate(&a).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_seeker_paired_mid_search_returns_candidate_to_head() {
        let (engine, dir) = engine();
        let s = dir.add_free("s", Gender::Male);
        let x = dir.add_free("x", Gender::Female);
        let c = dir.add_free("c", Gender::Female);

        engine.queues().enqueue(Tier::Free, &c).await.unwrap();
        engine.pairs().try_pair(&s, &x).await.unwrap();

        assert_eq!(engine.search(&s, None).await, None);
        assert_eq!(engine.queues().snapshot(Tier::Free).await.unwrap(), vec![c]);
        assert_eq!(engine.queues().locate(&s).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_banned_candidate_is_dropped() {
        let (engine, dir) = engine();
        let banned = dir.add_free("banned", Gender::Female);
        let ok = dir.add_free("ok", Gender::Female);
        let s = dir.add_free("s", Gender::Male);

        engine.queues().enqueue(Tier::Free, &banned).await.unwrap();
        engine.queues().enqueue(Tier::Free, &ok).await.unwrap();
        dir.ban(&banned);

        assert_eq!(engine.search(&s, None).await, Some(ok));
        assert_eq!(engine.queues().locate(&banned).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_banned_seeker_is_removed_from_queue() {
        let (engine, dir) = engine();
        let a = dir.add_free("a", Gender::Male);
        engine.enqueue(&a).await.unwrap();
        dir.ban(&a);

        assert_eq!(engine.search(&a, None).await, None);
        assert_eq!(engine.queues().locate(&a).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unresolvable_seeker_is_not_enqueued() {
        let (engine, dir) = engine();
        let a = dir.add_free("a", Gender::Male);
        dir.set_unavailable(&a, true);

        assert_eq!(engine.search(&a, None).await, None);
        assert!(engine.try_search(&a, None).await.is_err());
        assert_eq!(engine.queues().locate(&a).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_attempt_cap_bounds_scan() {
        let directory = Arc::new(StaticProfileDirectory::new());
        let engine = MatchEngine::new(
            Arc::new(MemoryStore::new()),
            StoreKey::default(),
            PreferenceResolver::new(directory.clone()),
            EngineConfig {
                max_attempts: 2,
                ..EngineConfig::default()
            },
        );

        let seeker = directory.add_vip("s", Gender::Male, GenderPreference::Any);

        // Three recent partners, then one fresh candidate at the back
        for i in 0..3 {
            let id = directory.add_vip(format!("r{}", i), Gender::Female, GenderPreference::Any);
            engine.queues().enqueue(Tier::VipAny, &id).await.unwrap();
            engine.recency().record(&seeker, &id).await.unwrap();
        }
        let fresh = directory.add_vip("fresh", Gender::Female, GenderPreference::Any);
        engine.queues().enqueue(Tier::VipAny, &fresh).await.unwrap();

        assert_eq!(engine.search(&seeker, None).await, None);

        // Two rejected candidates went to the tail, the fresh one was never claimed
        let queue = engine.queues().snapshot(Tier::VipAny).await.unwrap();
        assert_eq!(
            queue,
            vec![
                ParticipantId::from("r2"),
                fresh,
                ParticipantId::from("r0"),
                ParticipantId::from("r1"),
                seeker,
            ]
        );
    }

    #[tokio::test]
    async fn test_enqueue_outcomes() {
        let (engine, dir) = engine();
        let a = dir.add_vip("a", Gender::Female, GenderPreference::Male);
        let b = dir.add_free("b", Gender::Male);

        assert_eq!(engine.enqueue(&a).await.unwrap(), EnqueueOutcome::Queued(Tier::VipMale));
        assert_eq!(engine.enqueue(&a).await.unwrap(), EnqueueOutcome::AlreadyQueued(Tier::VipMale));
        assert_eq!(
            engine.enqueue(&ParticipantId::from("ghost")).await.unwrap(),
            EnqueueOutcome::Ineligible
        );

        engine.dequeue(&a).await.unwrap();
        engine.pairs().try_pair(&a, &b).await.unwrap();
        assert_eq!(engine.enqueue(&a).await.unwrap(), EnqueueOutcome::AlreadyPaired(b));
    }

    #[tokio::test]
    async fn test_lapsed_vip_moves_to_free_tier() {
        let (engine, dir) = engine();
        let a = dir.add_vip("a", Gender::Female, GenderPreference::Any);
        engine.enqueue(&a).await.unwrap();

        dir.set_vip(&a, None);
        assert_eq!(engine.enqueue(&a).await.unwrap(), EnqueueOutcome::Queued(Tier::Free));
        assert_eq!(engine.queues().len(Tier::VipAny).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_verification_leaves_nobody_paired() {
        let store = Arc::new(FaultyStore::new());
        let (engine, dir) = engine_over(store.clone());
        let a = dir.add_free("a", Gender::Male);
        let b = dir.add_free("b", Gender::Female);
        engine.queues().enqueue(Tier::Free, &a).await.unwrap();

        store.fail_gets(true);
        assert!(engine.try_search(&b, None).await.is_err());
        assert_eq!(engine.search(&b, None).await, None);
        store.fail_gets(false);

        assert_eq!(engine.partner(&a).await.unwrap(), None);
        assert_eq!(engine.partner(&b).await.unwrap(), None);
        assert_eq!(engine.queues().snapshot(Tier::Free).await.unwrap(), vec![a.clone()]);
        assert_eq!(engine.queues().locate(&b).await.unwrap(), None);

        // Once the store recovers the same pair forms normally
        assert_eq!(engine.search(&b, None).await, Some(a.clone()));
        assert_eq!(engine.partner(&a).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn test_unacknowledged_candidate_write_is_retried_cleanly() {
        let store = Arc::new(FaultyStore::new());
        let (engine, dir) = engine_over(store.clone());
        let a = dir.add_free("a", Gender::Male);
        let b = dir.add_free("b", Gender::Female);
        engine.queues().enqueue(Tier::Free, &a).await.unwrap();

        // The candidate's side is written second
        store.drop_ack_for("pair:a");
        assert_eq!(engine.search(&b, None).await, None);

        assert_eq!(engine.partner(&a).await.unwrap(), None);
        assert_eq!(engine.partner(&b).await.unwrap(), None);
        assert_eq!(engine.queues().snapshot(Tier::Free).await.unwrap(), vec![a.clone()]);

        assert_eq!(engine.search(&b, None).await, Some(a.clone()));
        assert_eq!(engine.partner(&a).await.unwrap(), Some(b));
    }
}
