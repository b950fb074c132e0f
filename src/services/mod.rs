// Service exports
pub mod memory;
pub mod pairs;
pub mod preferences;
pub mod profiles;
pub mod queue;
pub mod recency;
pub mod redis_store;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;
pub use pairs::{PairOutcome, PairRegistry};
pub use preferences::PreferenceResolver;
pub use profiles::{AppwriteCollections, AppwriteDirectory, ProfileDirectory, ProfileError, StaticProfileDirectory};
pub use queue::QueueStore;
pub use recency::RecencyGuard;
pub use redis_store::RedisStore;
pub use store::{SharedStore, StoreError, StoreKey};
