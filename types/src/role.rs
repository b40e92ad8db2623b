//! Membership status and role within a DAO.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Moderation state of a DAO membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Requested to join, awaiting moderation.
    Pending,
    /// Full member: counted for quorum, may vote and delegate.
    Approved,
    /// Removed by a moderator.
    Banned,
}

impl MembershipStatus {
    /// Whether this membership counts as an eligible voter.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Role held by a member inside a DAO, in increasing order of authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaoRole {
    Member,
    Moderator,
    Elder,
    Admin,
}

impl DaoRole {
    /// Moderators and above may approve or ban memberships.
    pub fn can_moderate(&self) -> bool {
        *self >= Self::Moderator
    }

    /// Elders and admins may tune quorum and queue passed proposals.
    pub fn can_manage_execution(&self) -> bool {
        matches!(self, Self::Elder | Self::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Elder => "elder",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for DaoRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
