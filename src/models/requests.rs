use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::GenderPreference;

/// Request to search for a partner
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 128))]
    #[serde(alias = "participant_id", rename = "participantId")]
    pub participant_id: String,
    /// One-off override of the stored VIP gender preference
    #[serde(default, alias = "gender_preference", rename = "genderPreference")]
    pub gender_preference: Option<GenderPreference>,
}

/// Request to join the waiting queue without searching
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnqueueRequest {
    #[validate(length(min = 1, max = 128))]
    #[serde(alias = "participant_id", rename = "participantId")]
    pub participant_id: String,
}
