//! Patron model (read-only to the circulation core)

use serde::{Deserialize, Serialize};

/// Membership tier, used as a one-time seed for the patron's loan ceiling.
///
/// The per-patron `loan_limit` stored on [`Patron`] is authoritative on
/// every check; the tier table is never re-consulted after seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    Standard,
    Student,
    Senior,
    Staff,
}

impl MembershipTier {
    /// Default loan ceiling for the tier; 0 would mean unlimited.
    pub fn default_loan_limit(self) -> u32 {
        match self {
            MembershipTier::Standard => 5,
            MembershipTier::Student => 8,
            MembershipTier::Senior => 5,
            MembershipTier::Staff => 12,
        }
    }
}

/// Library patron, consulted and never mutated by the circulation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patron {
    pub id: u64,
    pub membership: MembershipTier,
    /// Open-loan ceiling; 0 means unlimited.
    pub loan_limit: u32,
    pub blocked: bool,
}

impl Patron {
    /// New patron with the ceiling seeded from the membership tier.
    pub fn new(id: u64, membership: MembershipTier) -> Self {
        Self {
            id,
            membership,
            loan_limit: membership.default_loan_limit(),
            blocked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_seeds_limit() {
        let patron = Patron::new(1, MembershipTier::Staff);
        assert_eq!(patron.loan_limit, 12);
    }
}
