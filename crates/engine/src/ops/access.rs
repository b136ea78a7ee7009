//! Ownership and capability checks.
//!
//! Every mutating operation resolves the caller's rights here before any
//! write. "Not visible" and "visible but denied" are kept distinct:
//! non-members get [`EngineError::NotFound`], members lacking the required
//! capability get [`EngineError::Forbidden`].

use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    Capabilities, EngineError, ResultEngine, Scope, accounts, categories, group_members, groups,
    subcategories, users,
};

use super::Engine;

impl Engine {
    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<()> {
        let exists = users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::NotFound("user".to_string()));
        }
        Ok(())
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<groups::Model> {
        groups::Entity::find_by_id(group_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("group".to_string()))
    }

    /// The caller's capabilities inside a group, `None` when not a member.
    ///
    /// The owner is not stored as a member row and holds every capability.
    pub(super) async fn group_capabilities(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<Capabilities>> {
        let group = self.require_group(db, group_id).await?;
        if group.owner_user_id == user_id {
            return Ok(Some(Capabilities::all()));
        }
        let member = group_members::Entity::find_by_id((group_id, user_id.to_string()))
            .one(db)
            .await?;
        Ok(member.as_ref().map(Capabilities::from))
    }

    /// Ensures the caller can see records in `scope` at all.
    pub(super) async fn require_scope_read(
        &self,
        db: &DatabaseTransaction,
        scope: &Scope,
        user_id: &str,
    ) -> ResultEngine<Capabilities> {
        match scope {
            Scope::Personal { user_id: owner } => {
                if owner != user_id {
                    return Err(EngineError::NotFound("record".to_string()));
                }
                Ok(Capabilities::all())
            }
            Scope::Group { group_id } => self
                .group_capabilities(db, *group_id, user_id)
                .await?
                .ok_or_else(|| EngineError::NotFound("group".to_string())),
        }
    }

    /// Ensures the caller holds a specific capability for a mutation in
    /// `scope`. Personal scope belongs entirely to its owner.
    pub(super) async fn require_scope_capability(
        &self,
        db: &DatabaseTransaction,
        scope: &Scope,
        user_id: &str,
        capability: fn(&Capabilities) -> bool,
        action: &str,
    ) -> ResultEngine<()> {
        let caps = self.require_scope_read(db, scope, user_id).await?;
        if !capability(&caps) {
            return Err(EngineError::Forbidden(action.to_string()));
        }
        Ok(())
    }

    /// Loads an account visible to the caller, together with its scope.
    pub(super) async fn require_account_read(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(accounts::Model, Scope)> {
        let model = accounts::Entity::find_by_id(account_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
        let scope = scope_from_columns(model.user_id.clone(), model.group_id)?;
        self.require_scope_read(db, &scope, user_id).await?;
        Ok((model, scope))
    }

    pub(super) async fn require_account_write(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(accounts::Model, Scope)> {
        let (model, scope) = self.require_account_read(db, account_id, user_id).await?;
        self.require_scope_capability(db, &scope, user_id, |c| c.manage_accounts, "manage accounts")
            .await?;
        Ok((model, scope))
    }

    /// Loads a category visible to the caller, together with its scope.
    pub(super) async fn require_category_read(
        &self,
        db: &DatabaseTransaction,
        category_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(categories::Model, Scope)> {
        let model = categories::Entity::find_by_id(category_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("category".to_string()))?;
        let scope = scope_from_columns(model.user_id.clone(), model.group_id)?;
        self.require_scope_read(db, &scope, user_id).await?;
        Ok((model, scope))
    }

    pub(super) async fn require_category_write(
        &self,
        db: &DatabaseTransaction,
        category_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(categories::Model, Scope)> {
        let (model, scope) = self.require_category_read(db, category_id, user_id).await?;
        self.require_scope_capability(
            db,
            &scope,
            user_id,
            |c| c.manage_categories,
            "manage categories",
        )
        .await?;
        Ok((model, scope))
    }

    /// Resolves a subcategory and checks its parent category sits in the
    /// expected ownership scope. A reference across scopes is a conflict,
    /// not a missing record: the row exists, it just cannot be attached
    /// here.
    pub(super) async fn require_subcategory_in_scope(
        &self,
        db: &DatabaseTransaction,
        subcategory_id: Uuid,
        scope: &Scope,
    ) -> ResultEngine<subcategories::Model> {
        let (sub, category) = subcategories::Entity::find_by_id(subcategory_id)
            .find_also_related(categories::Entity)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("subcategory".to_string()))?;
        let category =
            category.ok_or_else(|| EngineError::NotFound("category".to_string()))?;
        let category_scope = scope_from_columns(category.user_id, category.group_id)?;
        if category_scope != *scope {
            return Err(EngineError::Conflict(
                "subcategory belongs to a different ownership scope".to_string(),
            ));
        }
        Ok(sub)
    }
}

/// Rebuilds the ownership union from the stored column pair.
pub(super) fn scope_from_columns(
    user_id: Option<String>,
    group_id: Option<Uuid>,
) -> ResultEngine<Scope> {
    match (user_id, group_id) {
        (Some(user_id), None) => Ok(Scope::Personal { user_id }),
        (None, Some(group_id)) => Ok(Scope::Group { group_id }),
        _ => Err(EngineError::InvalidInput(
            "record must be owned by exactly one of user or group".to_string(),
        )),
    }
}
