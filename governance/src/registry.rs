//! DAO registry and membership administration.
//!
//! A DAO's creator becomes its first approved admin. Everyone else joins as
//! pending and counts towards quorum only once a moderator approves them.

use crate::error::GovernanceError;
use crate::membership::{load_dao, require_member, require_role};
use agora_store::{Dao, DaoMembership, GovernanceStore, ReadTxn, Sequence, WriteTxn};
use agora_types::params::validate_delegation_percentage;
use agora_types::{Clock, DaoId, DaoRole, DaoSettings, MembershipStatus, UserId};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDao {
    pub name: String,
    #[serde(default)]
    pub settings: DaoSettings,
}

/// Admin-editable settings. Absent fields keep their current value.
///
/// `execution_delay_hours` distinguishes an absent field (`None`) from an
/// explicit `null` (`Some(None)`), which restores the default delay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub max_delegation_percentage: Option<u32>,
    #[serde(default, deserialize_with = "present")]
    pub execution_delay_hours: Option<Option<u32>>,
}

/// Wraps any present value, `null` included, in `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Ban,
}

/// Moderation and role change for one member, applied together.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdate {
    #[serde(default)]
    pub action: Option<ModerationAction>,
    #[serde(default)]
    pub role: Option<DaoRole>,
}

pub struct DaoRegistry<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: GovernanceStore> DaoRegistry<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create_dao(&self, creator_id: UserId, request: NewDao) -> Result<Dao, GovernanceError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(GovernanceError::Validation("dao name must not be empty".into()));
        }
        request.settings.validate()?;
        let now = self.clock.now();
        self.store.write(|txn| {
            let dao = Dao {
                id: DaoId::new(txn.next_id(Sequence::Dao)?),
                name,
                settings: request.settings,
                created_by: creator_id,
                created_at: now,
            };
            txn.put_dao(&dao)?;
            txn.put_membership(&DaoMembership {
                dao_id: dao.id,
                user_id: creator_id,
                status: MembershipStatus::Approved,
                role: DaoRole::Admin,
                joined_at: now,
                last_active: now,
            })?;
            info!(dao = %dao.id, name = %dao.name, creator = %creator_id, "dao created");
            Ok(dao)
        })
    }

    pub fn get_dao(&self, dao_id: DaoId) -> Result<Dao, GovernanceError> {
        self.store.read(|txn| load_dao(txn, dao_id))
    }

    /// Change delegation cap or timelock. Admins only.
    pub fn update_settings(
        &self,
        dao_id: DaoId,
        caller_id: UserId,
        update: SettingsUpdate,
    ) -> Result<Dao, GovernanceError> {
        self.store.write(|txn| {
            let mut dao = load_dao(&*txn, dao_id)?;
            require_role(&*txn, dao_id, caller_id, DaoRole::Admin)?;
            if let Some(pct) = update.max_delegation_percentage {
                dao.settings.max_delegation_percentage = validate_delegation_percentage(pct)?;
            }
            if let Some(hours) = update.execution_delay_hours {
                dao.settings.execution_delay_hours = hours;
            }
            txn.put_dao(&dao)?;
            info!(
                dao = %dao_id,
                by = %caller_id,
                max_delegation_percentage = dao.settings.max_delegation_percentage,
                execution_delay_hours = dao.settings.effective_execution_delay_hours(),
                "dao settings updated"
            );
            Ok(dao)
        })
    }

    /// Ask to join a DAO. Re-joining returns the existing membership; banned
    /// users stay banned.
    pub fn join(&self, dao_id: DaoId, user_id: UserId) -> Result<DaoMembership, GovernanceError> {
        let now = self.clock.now();
        self.store.write(|txn| {
            load_dao(&*txn, dao_id)?;
            if let Some(existing) = txn.get_membership(dao_id, user_id)? {
                if existing.status == MembershipStatus::Banned {
                    return Err(GovernanceError::Forbidden(format!(
                        "user {user_id} is banned from dao {dao_id}"
                    )));
                }
                return Ok(existing);
            }
            let membership = DaoMembership {
                dao_id,
                user_id,
                status: MembershipStatus::Pending,
                role: DaoRole::Member,
                joined_at: now,
                last_active: now,
            };
            txn.put_membership(&membership)?;
            info!(dao = %dao_id, user = %user_id, "membership requested");
            Ok(membership)
        })
    }

    /// Approve or ban a member. Moderators and above; a moderator cannot act
    /// on themselves or on someone of equal or higher role.
    pub fn moderate(
        &self,
        dao_id: DaoId,
        moderator_id: UserId,
        target_id: UserId,
        action: ModerationAction,
    ) -> Result<DaoMembership, GovernanceError> {
        self.store.write(|txn| {
            load_dao(&*txn, dao_id)?;
            apply_moderation(txn, dao_id, moderator_id, target_id, action)
        })
    }

    /// Assign a role to an approved member. Admins only.
    pub fn set_role(
        &self,
        dao_id: DaoId,
        admin_id: UserId,
        target_id: UserId,
        role: DaoRole,
    ) -> Result<DaoMembership, GovernanceError> {
        self.store.write(|txn| {
            load_dao(&*txn, dao_id)?;
            apply_role(txn, dao_id, admin_id, target_id, role)
        })
    }

    /// Moderation, then role assignment, in one transaction. If either step
    /// is refused nothing is written.
    pub fn update_member(
        &self,
        dao_id: DaoId,
        caller_id: UserId,
        target_id: UserId,
        update: MemberUpdate,
    ) -> Result<DaoMembership, GovernanceError> {
        self.store.write(|txn| {
            load_dao(&*txn, dao_id)?;
            match (update.action, update.role) {
                (None, None) => Err(GovernanceError::Validation(
                    "expected `action` and/or `role`".into(),
                )),
                (Some(action), None) => {
                    apply_moderation(txn, dao_id, caller_id, target_id, action)
                }
                (None, Some(role)) => apply_role(txn, dao_id, caller_id, target_id, role),
                (Some(action), Some(role)) => {
                    apply_moderation(txn, dao_id, caller_id, target_id, action)?;
                    apply_role(txn, dao_id, caller_id, target_id, role)
                }
            }
        })
    }

    pub fn list_members(
        &self,
        dao_id: DaoId,
        caller_id: UserId,
    ) -> Result<Vec<DaoMembership>, GovernanceError> {
        self.store.read(|txn| {
            load_dao(txn, dao_id)?;
            require_member(txn, dao_id, caller_id)?;
            Ok(txn.list_memberships(dao_id)?)
        })
    }
}

fn apply_moderation(
    txn: &mut dyn WriteTxn,
    dao_id: DaoId,
    moderator_id: UserId,
    target_id: UserId,
    action: ModerationAction,
) -> Result<DaoMembership, GovernanceError> {
    let moderator = require_role(&*txn, dao_id, moderator_id, DaoRole::Moderator)?;
    if moderator_id == target_id {
        return Err(GovernanceError::Validation("cannot moderate yourself".into()));
    }
    let mut target = load_membership(&*txn, dao_id, target_id)?;
    if target.role >= moderator.role {
        return Err(GovernanceError::Forbidden(format!(
            "{} cannot moderate a {}",
            moderator.role, target.role
        )));
    }
    target.status = match action {
        ModerationAction::Approve => MembershipStatus::Approved,
        ModerationAction::Ban => MembershipStatus::Banned,
    };
    txn.put_membership(&target)?;
    info!(
        dao = %dao_id,
        moderator = %moderator_id,
        target = %target_id,
        action = ?action,
        "membership moderated"
    );
    Ok(target)
}

fn apply_role(
    txn: &mut dyn WriteTxn,
    dao_id: DaoId,
    admin_id: UserId,
    target_id: UserId,
    role: DaoRole,
) -> Result<DaoMembership, GovernanceError> {
    require_role(&*txn, dao_id, admin_id, DaoRole::Admin)?;
    if admin_id == target_id && role != DaoRole::Admin {
        return Err(GovernanceError::Validation(
            "admins cannot demote themselves".into(),
        ));
    }
    let mut target = require_member(&*txn, dao_id, target_id).map_err(|_| {
        GovernanceError::Validation(format!(
            "user {target_id} is not an approved member of dao {dao_id}"
        ))
    })?;
    target.role = role;
    txn.put_membership(&target)?;
    info!(dao = %dao_id, by = %admin_id, target = %target_id, role = %role, "role assigned");
    Ok(target)
}

fn load_membership<T>(txn: &T, dao_id: DaoId, user_id: UserId) -> Result<DaoMembership, GovernanceError>
where
    T: ReadTxn + ?Sized,
{
    txn.get_membership(dao_id, user_id)?.ok_or_else(|| {
        GovernanceError::NotFound(format!("membership of user {user_id} in dao {dao_id}"))
    })
}
