// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{Gender, GenderPreference, ParticipantId, ParticipantProfile, Profile, Subscription, Tier, VipPreferences};
pub use requests::{EnqueueRequest, SearchRequest};
pub use responses::{
    DequeueResponse, EnqueueResponse, ErrorResponse, HealthResponse, PartnerResponse, QueueStatsResponse,
    SearchResponse, SearchStatus, TierDepth, UnpairResponse,
};
