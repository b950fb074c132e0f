use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque participant identifier (one per chat/session channel)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Profile gender as reported by the profile collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Who a participant wants to be paired with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderPreference {
    Male,
    Female,
    #[default]
    Any,
}

impl GenderPreference {
    /// Whether a partner of the given gender satisfies this preference
    #[inline]
    pub fn accepts(self, gender: Gender) -> bool {
        match self {
            GenderPreference::Any => true,
            GenderPreference::Male => gender == Gender::Male,
            GenderPreference::Female => gender == Gender::Female,
        }
    }
}

/// Matching pool a waiting participant sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    VipMale,
    VipFemale,
    VipAny,
    Free,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::VipMale, Tier::VipFemale, Tier::VipAny, Tier::Free];

    /// Name used in the store key space (`queue:<tier>`)
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::VipMale => "vip_male",
            Tier::VipFemale => "vip_female",
            Tier::VipAny => "vip_any",
            Tier::Free => "free",
        }
    }

    /// Tier for a VIP participant with the given preference
    pub fn vip(preference: GenderPreference) -> Self {
        match preference {
            GenderPreference::Male => Tier::VipMale,
            GenderPreference::Female => Tier::VipFemale,
            GenderPreference::Any => Tier::VipAny,
        }
    }

    /// VIP tier of participants who want `gender`
    pub fn wanting(gender: Gender) -> Self {
        match gender {
            Gender::Male => Tier::VipMale,
            Gender::Female => Tier::VipFemale,
        }
    }

    /// Preference every occupant of this tier declared, if the tier encodes one
    pub fn implied_preference(self) -> Option<GenderPreference> {
        match self {
            Tier::VipMale => Some(GenderPreference::Male),
            Tier::VipFemale => Some(GenderPreference::Female),
            Tier::VipAny => Some(GenderPreference::Any),
            Tier::Free => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile/eligibility record from the profile collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub gender: Option<Gender>,
}

/// VIP subscription record from the subscription collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "isActive", default)]
    pub is_active: bool,
    #[serde(rename = "genderPreference", default)]
    pub gender_preference: GenderPreference,
}

/// VIP preferences of a subscribed participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VipPreferences {
    pub gender: GenderPreference,
}

/// Point-in-time view of a participant, as resolved for one matching attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub id: ParticipantId,
    pub banned: bool,
    pub gender: Option<Gender>,
    pub vip: bool,
    pub vip_preference: GenderPreference,
}

impl ParticipantProfile {
    /// Preference that applies when this participant searches
    pub fn effective_preference(&self, explicit: Option<GenderPreference>) -> GenderPreference {
        if !self.vip {
            return GenderPreference::Any;
        }
        explicit.unwrap_or(self.vip_preference)
    }

    /// Tier this participant waits in for the given effective preference
    pub fn tier(&self, preference: GenderPreference) -> Tier {
        if self.vip {
            Tier::vip(preference)
        } else {
            Tier::Free
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(vip: bool, preference: GenderPreference) -> ParticipantProfile {
        ParticipantProfile {
            id: ParticipantId::from("p1"),
            banned: false,
            gender: Some(Gender::Male),
            vip,
            vip_preference: preference,
        }
    }

    #[test]
    fn test_preference_accepts() {
        assert!(GenderPreference::Any.accepts(Gender::Male));
        assert!(GenderPreference::Any.accepts(Gender::Female));
        assert!(GenderPreference::Female.accepts(Gender::Female));
        assert!(!GenderPreference::Female.accepts(Gender::Male));
    }

    #[test]
    fn test_free_participant_ignores_explicit_preference() {
        let free = profile(false, GenderPreference::Any);
        assert_eq!(
            free.effective_preference(Some(GenderPreference::Female)),
            GenderPreference::Any
        );
        assert_eq!(free.tier(GenderPreference::Any), Tier::Free);
    }

    #[test]
    fn test_vip_explicit_preference_overrides_stored() {
        let vip = profile(true, GenderPreference::Male);
        assert_eq!(vip.effective_preference(None), GenderPreference::Male);
        let pref = vip.effective_preference(Some(GenderPreference::Female));
        assert_eq!(pref, GenderPreference::Female);
        assert_eq!(vip.tier(pref), Tier::VipFemale);
    }

    #[test]
    fn test_vip_tier_follows_preference() {
        let vip = profile(true, GenderPreference::Any);
        assert_eq!(vip.tier(GenderPreference::Any), Tier::VipAny);
        assert_eq!(vip.tier(GenderPreference::Male), Tier::VipMale);
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(serde_json::to_string(&Tier::VipAny).unwrap(), "\"vip_any\"");
        assert_eq!(Tier::Free.to_string(), "free");
        let id: ParticipantId = serde_json::from_str("\"chat-42\"").unwrap();
        assert_eq!(id.as_str(), "chat-42");
    }
}
