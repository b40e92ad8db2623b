//! DAO and membership records.

use agora_types::{DaoId, DaoRole, DaoSettings, MembershipStatus, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A community organisation and its governance settings.
///
/// There is no stored member count; callers recount approved memberships
/// inside the transaction that needs the number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dao {
    pub id: DaoId,
    pub name: String,
    pub settings: DaoSettings,
    pub created_by: UserId,
    pub created_at: Timestamp,
}

/// A user's membership in a DAO. Unique per (dao_id, user_id).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaoMembership {
    pub dao_id: DaoId,
    pub user_id: UserId,
    pub status: MembershipStatus,
    pub role: DaoRole,
    pub joined_at: Timestamp,
    pub last_active: Timestamp,
}

impl DaoMembership {
    /// Whether this member may exercise `role`-gated actions right now.
    pub fn has_at_least(&self, role: DaoRole) -> bool {
        self.status.is_eligible() && self.role >= role
    }

    pub fn can_manage_execution(&self) -> bool {
        self.status.is_eligible() && self.role.can_manage_execution()
    }
}
