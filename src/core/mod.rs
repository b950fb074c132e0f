// Core pairing exports
pub mod engine;
pub mod filters;
pub mod seeker;
pub mod sweep;

pub use engine::{EngineConfig, EnqueueOutcome, MatchEngine, MatchError};
pub use filters::{candidate_preference, check_candidate, Rejection};
pub use seeker::Seeker;
pub use sweep::{BackgroundSweep, SweepReport};
