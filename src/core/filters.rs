use std::fmt;

use crate::core::seeker::Seeker;
use crate::models::{GenderPreference, ParticipantProfile, Tier};

/// Why a claimed candidate was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    SelfMatch,
    Banned,
    IncompleteProfile,
    Unresolved,
    RecentPartner,
    /// Candidate's gender does not satisfy the seeker's preference
    GenderMismatch,
    /// Seeker's gender does not satisfy the candidate's preference
    NotWanted,
}

impl Rejection {
    /// Whether the candidate goes back to the tail of its tier
    ///
    /// Banned and incomplete profiles are dropped; everyone else is only
    /// unsuitable for this particular seeker.
    pub fn keeps_place(self) -> bool {
        !matches!(self, Rejection::Banned | Rejection::IncompleteProfile)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::SelfMatch => "self match",
            Rejection::Banned => "banned",
            Rejection::IncompleteProfile => "incomplete profile",
            Rejection::Unresolved => "profile unavailable",
            Rejection::RecentPartner => "recent partner",
            Rejection::GenderMismatch => "gender mismatch",
            Rejection::NotWanted => "not wanted by candidate",
        };
        f.write_str(reason)
    }
}

/// Preference a candidate claimed from `tier` is matched against
///
/// VIP tiers encode their occupants' preference directly, which also covers
/// one-off explicit preferences. Free-tier candidates only constrain the
/// seeker if they hold an active VIP subscription.
#[inline]
pub fn candidate_preference(tier: Tier, candidate: &ParticipantProfile) -> GenderPreference {
    match tier.implied_preference() {
        Some(preference) => preference,
        None if candidate.vip => candidate.vip_preference,
        None => GenderPreference::Any,
    }
}

/// Check a resolved candidate against a seeker
///
/// Covers everything except the recency cooldown, which needs the store.
/// Both directions are checked: the candidate must satisfy the seeker's
/// preference and the seeker must satisfy the candidate's.
pub fn check_candidate(seeker: &Seeker, candidate: &ParticipantProfile, tier: Tier) -> Result<(), Rejection> {
    if candidate.id == seeker.id {
        return Err(Rejection::SelfMatch);
    }

    if candidate.banned {
        return Err(Rejection::Banned);
    }

    let Some(gender) = candidate.gender else {
        return Err(Rejection::IncompleteProfile);
    };

    if !seeker.preference.accepts(gender) {
        return Err(Rejection::GenderMismatch);
    }

    if !candidate_preference(tier, candidate).accepts(seeker.gender) {
        return Err(Rejection::NotWanted);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, ParticipantId};

    fn seeker(gender: Gender, preference: GenderPreference) -> Seeker {
        Seeker {
            id: ParticipantId::from("seeker"),
            gender,
            vip: true,
            preference,
            tier: Tier::vip(preference),
        }
    }

    fn candidate(id: &str, gender: Gender, vip: Option<GenderPreference>) -> ParticipantProfile {
        ParticipantProfile {
            id: ParticipantId::from(id),
            banned: false,
            gender: Some(gender),
            vip: vip.is_some(),
            vip_preference: vip.unwrap_or_default(),
        }
    }

    #[test]
    fn test_compatible_pair_passes() {
        let s = seeker(Gender::Male, GenderPreference::Female);
        let c = candidate("c", Gender::Female, None);
        assert_eq!(check_candidate(&s, &c, Tier::Free), Ok(()));
    }

    #[test]
    fn test_seeker_preference_enforced() {
        let s = seeker(Gender::Male, GenderPreference::Female);
        let c = candidate("c", Gender::Male, None);
        assert_eq!(check_candidate(&s, &c, Tier::Free), Err(Rejection::GenderMismatch));
    }

    #[test]
    fn test_candidate_preference_enforced() {
        // Candidate waits in VIP_MALE, seeker is female
        let s = seeker(Gender::Female, GenderPreference::Any);
        let c = candidate("c", Gender::Male, Some(GenderPreference::Male));
        assert_eq!(check_candidate(&s, &c, Tier::VipMale), Err(Rejection::NotWanted));
    }

    #[test]
    fn test_vip_candidate_in_free_tier_keeps_preference() {
        let s = seeker(Gender::Male, GenderPreference::Any);
        let c = candidate("c", Gender::Female, Some(GenderPreference::Female));
        assert_eq!(check_candidate(&s, &c, Tier::Free), Err(Rejection::NotWanted));
    }

    #[test]
    fn test_tier_preference_overrides_stored_preference() {
        // Stored preference is Female but the candidate queued in VIP_ANY
        let s = seeker(Gender::Male, GenderPreference::Any);
        let c = candidate("c", Gender::Female, Some(GenderPreference::Female));
        assert_eq!(check_candidate(&s, &c, Tier::VipAny), Ok(()));
    }

    #[test]
    fn test_self_banned_and_incomplete() {
        let s = seeker(Gender::Male, GenderPreference::Any);

        let me = candidate("seeker", Gender::Female, None);
        assert_eq!(check_candidate(&s, &me, Tier::Free), Err(Rejection::SelfMatch));

        let mut banned = candidate("b", Gender::Female, None);
        banned.banned = true;
        assert_eq!(check_candidate(&s, &banned, Tier::Free), Err(Rejection::Banned));

        let mut incomplete = candidate("i", Gender::Female, None);
        incomplete.gender = None;
        assert_eq!(check_candidate(&s, &incomplete, Tier::Free), Err(Rejection::IncompleteProfile));
    }

    #[test]
    fn test_rejection_requeue_policy() {
        assert!(Rejection::RecentPartner.keeps_place());
        assert!(Rejection::Unresolved.keeps_place());
        assert!(!Rejection::Banned.keeps_place());
        assert!(!Rejection::IncompleteProfile.keeps_place());
    }
}
