//! Lume Pairing - anonymous one-to-one chat matchmaking for Lume
//!
//! This library provides the pairing engine behind Lume's anonymous chat.
//! Participants wait in tiered queues (VIP by gender preference, then free)
//! and are paired through a two-phase compare-and-set on a shared store, so
//! any number of concurrent searchers and sweeps never double-pair anyone.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{BackgroundSweep, EngineConfig, EnqueueOutcome, MatchEngine, MatchError, SweepReport};
pub use models::{Gender, GenderPreference, ParticipantId, Tier};
pub use services::{MemoryStore, PairOutcome, PreferenceResolver, RedisStore, SharedStore, StaticProfileDirectory, StoreKey};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        assert_eq!(Tier::vip(GenderPreference::Female), Tier::VipFemale);
        assert!(PairOutcome::Paired.is_paired());
    }
}
