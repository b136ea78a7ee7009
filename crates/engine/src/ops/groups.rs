//! Group management and member capabilities.

use sea_orm::{ActiveValue, Condition, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{Capabilities, EngineError, ResultEngine, group_members, groups};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Creates a group owned by the caller.
    pub async fn new_group(&self, name: &str, user_id: &str) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "group")?;
        let id = Uuid::new_v4();
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            let active = groups::ActiveModel {
                id: ActiveValue::Set(id),
                name: ActiveValue::Set(name),
                owner_user_id: ActiveValue::Set(user_id.to_string()),
            };
            active.insert(&db_tx).await?;
            Ok(id)
        })
    }

    /// Lists groups the caller owns or is a member of.
    pub async fn list_groups(&self, user_id: &str) -> ResultEngine<Vec<groups::Model>> {
        with_tx!(self, |db_tx| {
            let member_of: Vec<Uuid> = group_members::Entity::find()
                .filter(group_members::Column::UserId.eq(user_id.to_string()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|m| m.group_id)
                .collect();

            let models = groups::Entity::find()
                .filter(
                    Condition::any()
                        .add(groups::Column::OwnerUserId.eq(user_id.to_string()))
                        .add(groups::Column::Id.is_in(member_of)),
                )
                .all(&db_tx)
                .await?;
            Ok(models)
        })
    }

    /// Deletes a group (owner-only). Group-owned records go with it via the
    /// schema's cascading foreign keys.
    pub async fn delete_group(&self, group_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            if group.owner_user_id != user_id {
                return Err(EngineError::NotFound("group".to_string()));
            }
            groups::Entity::delete_by_id(group_id).exec(&db_tx).await?;
            Ok(())
        })
    }

    /// Adds or updates a member's capabilities (owner-only).
    ///
    /// The owner's implicit all-capabilities role is not a member row and
    /// can never be the target of this operation.
    pub async fn upsert_group_member(
        &self,
        group_id: Uuid,
        member_username: &str,
        capabilities: Capabilities,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            if group.owner_user_id != user_id {
                return Err(EngineError::Forbidden("manage group members".to_string()));
            }
            if member_username == group.owner_user_id {
                return Err(EngineError::Conflict(
                    "cannot change the group owner's role".to_string(),
                ));
            }
            self.require_user_exists(&db_tx, member_username).await?;

            let active = group_members::ActiveModel {
                group_id: ActiveValue::Set(group_id),
                user_id: ActiveValue::Set(member_username.to_string()),
                can_manage_accounts: ActiveValue::Set(capabilities.manage_accounts),
                can_manage_categories: ActiveValue::Set(capabilities.manage_categories),
                can_manage_budgets: ActiveValue::Set(capabilities.manage_budgets),
                can_add_transactions: ActiveValue::Set(capabilities.add_transactions),
                can_view_transactions: ActiveValue::Set(capabilities.view_transactions),
            };

            // Upsert: insert if missing, otherwise update the flags.
            match group_members::Entity::find_by_id((group_id, member_username.to_string()))
                .one(&db_tx)
                .await?
            {
                Some(_) => {
                    active.update(&db_tx).await?;
                }
                None => {
                    active.insert(&db_tx).await?;
                }
            }

            Ok(())
        })
    }

    /// Removes a member (owner-only). The owner cannot be removed.
    pub async fn remove_group_member(
        &self,
        group_id: Uuid,
        member_username: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            if group.owner_user_id != user_id {
                return Err(EngineError::Forbidden("manage group members".to_string()));
            }
            if member_username == group.owner_user_id {
                return Err(EngineError::Conflict(
                    "cannot remove the group owner".to_string(),
                ));
            }
            group_members::Entity::delete_by_id((group_id, member_username.to_string()))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Lists members with their capabilities (any member may look).
    pub async fn list_group_members(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<(String, Capabilities)>> {
        with_tx!(self, |db_tx| {
            self.group_capabilities(&db_tx, group_id, user_id)
                .await?
                .ok_or_else(|| EngineError::NotFound("group".to_string()))?;

            let rows = group_members::Entity::find()
                .filter(group_members::Column::GroupId.eq(group_id))
                .all(&db_tx)
                .await?;
            Ok(rows
                .into_iter()
                .map(|m| {
                    let caps = Capabilities::from(&m);
                    (m.user_id, caps)
                })
                .collect())
        })
    }
}
