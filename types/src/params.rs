//! DAO governance settings and the arithmetic derived from them.
//!
//! All percentage thresholds round up: a 20% quorum of 101 members is 21 votes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quorum percentage used when a DAO does not configure one.
pub const DEFAULT_QUORUM_PERCENTAGE: u32 = 20;
/// Lowest quorum percentage a DAO may configure.
pub const MIN_QUORUM_PERCENTAGE: u32 = 5;
/// Highest quorum percentage a DAO may configure.
pub const MAX_QUORUM_PERCENTAGE: u32 = 75;

/// Delegation cap used when a DAO does not configure one.
pub const DEFAULT_MAX_DELEGATION_PERCENTAGE: u32 = 10;
pub const MIN_DELEGATION_PERCENTAGE: u32 = 1;
pub const MAX_DELEGATION_PERCENTAGE: u32 = 100;

/// Floor on the timelock; DAO overrides below this are raised to it.
pub const MIN_EXECUTION_DELAY_HOURS: u32 = 24;
/// Timelock used when a DAO does not configure one.
pub const DEFAULT_EXECUTION_DELAY_HOURS: u32 = 48;

/// Longest delegation chain followed when resolving voting weight.
pub const MAX_DELEGATION_DEPTH: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("quorum percentage must be between {min} and {max}, got {got}")]
    QuorumOutOfRange { got: u32, min: u32, max: u32 },

    #[error("max delegation percentage must be between {min} and {max}, got {got}")]
    DelegationCapOutOfRange { got: u32, min: u32, max: u32 },
}

/// Per-DAO governance configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaoSettings {
    pub quorum_percentage: u32,
    pub max_delegation_percentage: u32,
    /// Configured timelock; `None` means the default applies.
    pub execution_delay_hours: Option<u32>,
}

impl Default for DaoSettings {
    fn default() -> Self {
        Self {
            quorum_percentage: DEFAULT_QUORUM_PERCENTAGE,
            max_delegation_percentage: DEFAULT_MAX_DELEGATION_PERCENTAGE,
            execution_delay_hours: None,
        }
    }
}

impl DaoSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_quorum_percentage(self.quorum_percentage)?;
        validate_delegation_percentage(self.max_delegation_percentage)?;
        Ok(())
    }

    /// Votes required for quorum given the current active membership.
    pub fn required_quorum(&self, active_members: u64) -> u64 {
        ceil_percentage(active_members, self.quorum_percentage)
    }

    /// Most active delegations any single delegate may hold.
    pub fn max_delegations_per_delegate(&self, total_members: u64) -> u64 {
        ceil_percentage(total_members, self.max_delegation_percentage)
    }

    /// Timelock actually applied: the override or the default, never below the floor.
    pub fn effective_execution_delay_hours(&self) -> u32 {
        self.execution_delay_hours
            .unwrap_or(DEFAULT_EXECUTION_DELAY_HOURS)
            .max(MIN_EXECUTION_DELAY_HOURS)
    }
}

pub fn validate_quorum_percentage(pct: u32) -> Result<u32, SettingsError> {
    if (MIN_QUORUM_PERCENTAGE..=MAX_QUORUM_PERCENTAGE).contains(&pct) {
        Ok(pct)
    } else {
        Err(SettingsError::QuorumOutOfRange {
            got: pct,
            min: MIN_QUORUM_PERCENTAGE,
            max: MAX_QUORUM_PERCENTAGE,
        })
    }
}

pub fn validate_delegation_percentage(pct: u32) -> Result<u32, SettingsError> {
    if (MIN_DELEGATION_PERCENTAGE..=MAX_DELEGATION_PERCENTAGE).contains(&pct) {
        Ok(pct)
    } else {
        Err(SettingsError::DelegationCapOutOfRange {
            got: pct,
            min: MIN_DELEGATION_PERCENTAGE,
            max: MAX_DELEGATION_PERCENTAGE,
        })
    }
}

/// `ceil(count * pct / 100)` in integer arithmetic.
pub fn ceil_percentage(count: u64, pct: u32) -> u64 {
    let scaled = u128::from(count) * u128::from(pct);
    let ceiled = scaled.div_ceil(100);
    u64::try_from(ceiled).unwrap_or(u64::MAX)
}

/// Share of members who voted, as a percentage rounded to two decimals.
/// Zero members means zero participation.
pub fn participation_rate(total_votes: u64, active_members: u64) -> f64 {
    if active_members == 0 {
        return 0.0;
    }
    let rate = total_votes as f64 / active_members as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_quorum_rounds_up() {
        let s = DaoSettings::default();
        assert_eq!(s.required_quorum(100), 20);
        assert_eq!(s.required_quorum(101), 21);
        assert_eq!(s.required_quorum(1), 1);
        assert_eq!(s.required_quorum(0), 0);
    }

    #[test]
    fn delegation_cap_for_fifty_members() {
        let s = DaoSettings::default();
        assert_eq!(s.max_delegations_per_delegate(50), 5);
        assert_eq!(s.max_delegations_per_delegate(51), 6);
    }

    #[test]
    fn delay_floor_applies_to_overrides() {
        let mut s = DaoSettings::default();
        assert_eq!(s.effective_execution_delay_hours(), 48);
        s.execution_delay_hours = Some(10);
        assert_eq!(s.effective_execution_delay_hours(), 24);
        s.execution_delay_hours = Some(72);
        assert_eq!(s.effective_execution_delay_hours(), 72);
    }

    #[test]
    fn quorum_range_is_inclusive() {
        assert!(validate_quorum_percentage(5).is_ok());
        assert!(validate_quorum_percentage(75).is_ok());
        assert!(validate_quorum_percentage(4).is_err());
        assert!(validate_quorum_percentage(76).is_err());
    }

    #[test]
    fn participation_with_no_members_is_zero() {
        assert_eq!(participation_rate(5, 0), 0.0);
        assert!((participation_rate(19, 100) - 19.0).abs() < f64::EPSILON);
        assert_eq!(participation_rate(1, 3), 33.33);
        assert_eq!(participation_rate(2, 3), 66.67);
    }
}
