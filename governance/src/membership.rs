//! Membership gate: who counts as an eligible voter, and who holds which role.

use crate::error::GovernanceError;
use agora_store::{Dao, DaoMembership, GovernanceStore, ReadTxn};
use agora_types::{DaoId, DaoRole, UserId};
use std::sync::Arc;

/// Resolves the eligible-voter count of a DAO.
pub struct MembershipGate<S> {
    store: Arc<S>,
}

impl<S: GovernanceStore> MembershipGate<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Number of approved memberships in `dao_id` right now.
    pub fn active_member_count(&self, dao_id: DaoId) -> Result<u64, GovernanceError> {
        self.store.read(|txn| {
            load_dao(txn, dao_id)?;
            count_active_members(txn, dao_id)
        })
    }

    /// Fails unless `user_id` is an approved member of `dao_id`.
    pub fn check_member(
        &self,
        dao_id: DaoId,
        user_id: UserId,
    ) -> Result<DaoMembership, GovernanceError> {
        self.store.read(|txn| {
            load_dao(txn, dao_id)?;
            require_member(txn, dao_id, user_id)
        })
    }
}

/// Count approved memberships inside an open transaction.
pub fn count_active_members<T>(txn: &T, dao_id: DaoId) -> Result<u64, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    let count = txn
        .list_memberships(dao_id)?
        .iter()
        .filter(|m| m.status.is_eligible())
        .count();
    Ok(count as u64)
}

pub fn load_dao<T>(txn: &T, dao_id: DaoId) -> Result<Dao, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    txn.get_dao(dao_id)?
        .ok_or_else(|| GovernanceError::NotFound(format!("dao {dao_id}")))
}

/// The caller's membership, which must be approved.
pub fn require_member<T>(
    txn: &T,
    dao_id: DaoId,
    user_id: UserId,
) -> Result<DaoMembership, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    match txn.get_membership(dao_id, user_id)? {
        Some(m) if m.status.is_eligible() => Ok(m),
        Some(m) => Err(GovernanceError::Forbidden(format!(
            "user {user_id} membership in dao {dao_id} is {:?}",
            m.status
        ))),
        None => Err(GovernanceError::Forbidden(format!(
            "user {user_id} is not a member of dao {dao_id}"
        ))),
    }
}

/// The caller's membership, which must be approved and hold at least `role`.
pub fn require_role<T>(
    txn: &T,
    dao_id: DaoId,
    user_id: UserId,
    role: DaoRole,
) -> Result<DaoMembership, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    let membership = require_member(txn, dao_id, user_id)?;
    if !membership.has_at_least(role) {
        return Err(GovernanceError::Forbidden(format!(
            "requires {role} role, user {user_id} is {}",
            membership.role
        )));
    }
    Ok(membership)
}

/// The caller's membership, which must be an approved elder or admin.
pub fn require_execution_manager<T>(
    txn: &T,
    dao_id: DaoId,
    user_id: UserId,
) -> Result<DaoMembership, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    let membership = require_member(txn, dao_id, user_id)?;
    if !membership.can_manage_execution() {
        return Err(GovernanceError::Forbidden(format!(
            "requires admin or elder role, user {user_id} is {}",
            membership.role
        )));
    }
    Ok(membership)
}
