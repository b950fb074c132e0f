use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::models::{GenderPreference, ParticipantId, ParticipantProfile};
use crate::services::profiles::{ProfileDirectory, ProfileError};

/// Resolves a participant's eligibility, gender and VIP preference
///
/// Results may be held in a short-lived local cache so that one sweep pass
/// does not look the same candidate up dozens of times. The cache belongs to
/// this resolver instance; keep its TTL to seconds, since the directory is
/// the source of truth and bans or subscription changes must show up quickly.
#[derive(Clone)]
pub struct PreferenceResolver {
    directory: Arc<dyn ProfileDirectory>,
    cache: Option<moka::future::Cache<ParticipantId, ParticipantProfile>>,
}

impl PreferenceResolver {
    /// Resolver that asks the directory every time
    pub fn new(directory: Arc<dyn ProfileDirectory>) -> Self {
        Self { directory, cache: None }
    }

    /// Resolver with a bounded, short-lived cache
    pub fn with_cache(directory: Arc<dyn ProfileDirectory>, capacity: u64, ttl: Duration) -> Self {
        let cache = moka::future::CacheBuilder::new(capacity).time_to_live(ttl).build();
        Self {
            directory,
            cache: Some(cache),
        }
    }

    /// Resolve a participant
    ///
    /// Returns `Ok(None)` if the directory does not know the participant.
    pub async fn resolve(&self, id: &ParticipantId) -> Result<Option<ParticipantProfile>, ProfileError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(id).await {
                tracing::trace!("Preference cache hit: {}", id);
                return Ok(Some(hit));
            }
        }

        let Some(profile) = self.directory.get_profile(id).await? else {
            return Ok(None);
        };
        let vip = self.directory.vip_status(id).await?;

        let resolved = ParticipantProfile {
            id: id.clone(),
            banned: profile.banned,
            gender: profile.gender,
            vip: vip.is_some(),
            vip_preference: vip.map_or(GenderPreference::Any, |p| p.gender),
        };

        if let Some(cache) = &self.cache {
            cache.insert(id.clone(), resolved.clone()).await;
        }

        Ok(Some(resolved))
    }

    /// Warm the cache for a batch of upcoming candidates concurrently
    ///
    /// No-op without a cache. Lookup failures are ignored here; they will
    /// surface again when the candidate is actually evaluated.
    pub async fn prefetch(&self, ids: &[ParticipantId]) {
        let Some(cache) = &self.cache else {
            return;
        };

        let mut tasks = JoinSet::new();
        for id in ids {
            if cache.contains_key(id) {
                continue;
            }
            let resolver = self.clone();
            let id = id.clone();
            tasks.spawn(async move { resolver.resolve(&id).await.is_ok() });
        }

        let mut warmed = 0usize;
        while let Some(result) = tasks.join_next().await {
            if matches!(result, Ok(true)) {
                warmed += 1;
            }
        }
        tracing::trace!("Prefetched {} of {} candidate profiles", warmed, ids.len());
    }
}
