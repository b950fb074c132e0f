use crate::models::{Gender, GenderPreference, ParticipantId, ParticipantProfile, Tier};

/// An eligible participant running a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seeker {
    pub id: ParticipantId,
    pub gender: Gender,
    pub vip: bool,
    /// Preference in effect for this search
    pub preference: GenderPreference,
    /// Tier this participant waits in if the search finds nobody
    pub tier: Tier,
}

impl Seeker {
    /// Build a seeker from a resolved profile
    ///
    /// Returns `None` for banned participants and profiles missing a gender.
    pub fn from_profile(profile: &ParticipantProfile, explicit: Option<GenderPreference>) -> Option<Self> {
        if profile.banned {
            return None;
        }
        let gender = profile.gender?;
        let preference = profile.effective_preference(explicit);

        Some(Self {
            id: profile.id.clone(),
            gender,
            vip: profile.vip,
            preference,
            tier: profile.tier(preference),
        })
    }

    /// Tiers to search, in priority order
    ///
    /// VIP: own preference tier, then the tier of VIPs who want the seeker's
    /// gender, then VIP-any, then free. Free participants only ever draw from
    /// the free tier; VIP to free matches are always initiated from the VIP
    /// side.
    pub fn search_order(&self) -> Vec<Tier> {
        if !self.vip {
            return vec![Tier::Free];
        }

        let mut order = Vec::with_capacity(4);
        for tier in [Tier::vip(self.preference), Tier::wanting(self.gender), Tier::VipAny] {
            if !order.contains(&tier) {
                order.push(tier);
            }
        }
        order.push(Tier::Free);
        order
    }
}
