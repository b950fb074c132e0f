use serde::{Deserialize, Serialize};

use crate::models::domain::{ParticipantId, Tier};

/// Outcome reported by the search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Paired,
    AlreadyPaired,
    Waiting,
}

/// Response for the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "participantId")]
    pub participant_id: ParticipantId,
    #[serde(rename = "partnerId")]
    pub partner_id: Option<ParticipantId>,
    pub status: SearchStatus,
}

/// Response for the enqueue endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    #[serde(rename = "participantId")]
    pub participant_id: ParticipantId,
    pub outcome: String,
    pub tier: Option<Tier>,
}

/// Response for the dequeue endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DequeueResponse {
    #[serde(rename = "participantId")]
    pub participant_id: ParticipantId,
    pub removed: usize,
}

/// Response for the partner lookup endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerResponse {
    #[serde(rename = "participantId")]
    pub participant_id: ParticipantId,
    #[serde(rename = "partnerId")]
    pub partner_id: Option<ParticipantId>,
}

/// Response for the unpair endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpairResponse {
    #[serde(rename = "participantId")]
    pub participant_id: ParticipantId,
    #[serde(rename = "formerPartnerId")]
    pub former_partner_id: Option<ParticipantId>,
}

/// Queue depth of a single tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierDepth {
    pub tier: Tier,
    pub waiting: usize,
}

/// Response for the queue statistics endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatsResponse {
    pub tiers: Vec<TierDepth>,
    pub total: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}
