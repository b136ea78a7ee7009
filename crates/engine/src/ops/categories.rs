//! Category and subcategory management.
//!
//! Hide/unhide cascades from a category to its subcategories inside one
//! storage transaction, so no reader ever observes a hidden category with a
//! visible child. Deletes with dependent records require the caller to pick
//! cascade-delete or move-to-target; nothing is orphaned silently.

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CategoryKind, EngineError, ResultEngine, Scope, accounts, budgets, categories, subcategories,
    transactions,
};

use super::{Engine, normalize_required_name, with_tx};

/// What to do with dependent records when deleting a (sub)category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "target")]
pub enum DeleteMode {
    /// Delete dependent transactions and budgets, detach accounts.
    Cascade,
    /// Re-point dependent records at another subcategory.
    MoveTo(Uuid),
}

/// Records that still reference a (sub)category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentCounts {
    pub transactions: u64,
    pub budgets: u64,
    pub accounts: u64,
}

impl DependentCounts {
    pub fn is_empty(&self) -> bool {
        self.transactions == 0 && self.budgets == 0 && self.accounts == 0
    }
}

impl Engine {
    /// Creates a category in the caller's personal scope or a group.
    pub async fn new_category(
        &self,
        name: &str,
        kind: CategoryKind,
        group_id: Option<Uuid>,
        user_id: &str,
    ) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "category")?;
        let scope = Scope::for_caller(user_id, group_id);
        let id = Uuid::new_v4();
        with_tx!(self, |db_tx| {
            self.require_scope_capability(
                &db_tx,
                &scope,
                user_id,
                |c| c.manage_categories,
                "manage categories",
            )
            .await?;

            let (owner_user, owner_group) = scope.columns();
            let active = categories::ActiveModel {
                id: ActiveValue::Set(id),
                user_id: ActiveValue::Set(owner_user),
                group_id: ActiveValue::Set(owner_group),
                name: ActiveValue::Set(name),
                kind: ActiveValue::Set(kind.as_str().to_string()),
                hidden: ActiveValue::Set(false),
            };
            active.insert(&db_tx).await?;
            Ok(id)
        })
    }

    /// Lists categories with their subcategories for one ownership scope.
    pub async fn list_categories(
        &self,
        group_id: Option<Uuid>,
        include_hidden: bool,
        user_id: &str,
    ) -> ResultEngine<Vec<(categories::Model, Vec<subcategories::Model>)>> {
        let scope = Scope::for_caller(user_id, group_id);
        with_tx!(self, |db_tx| {
            self.require_scope_read(&db_tx, &scope, user_id).await?;

            let mut query = categories::Entity::find()
                .filter(scope.condition(categories::Column::UserId, categories::Column::GroupId))
                .order_by_asc(categories::Column::Name);
            if !include_hidden {
                query = query.filter(categories::Column::Hidden.eq(false));
            }

            let rows = query
                .find_with_related(subcategories::Entity)
                .all(&db_tx)
                .await?;
            if include_hidden {
                return Ok(rows);
            }
            Ok(rows
                .into_iter()
                .map(|(category, subs)| {
                    let subs = subs.into_iter().filter(|s| !s.hidden).collect();
                    (category, subs)
                })
                .collect())
        })
    }

    /// Loads one category with its subcategories.
    pub async fn category(
        &self,
        category_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(categories::Model, Vec<subcategories::Model>)> {
        with_tx!(self, |db_tx| {
            let (category, _) = self
                .require_category_read(&db_tx, category_id, user_id)
                .await?;
            let subs = subcategories::Entity::find()
                .filter(subcategories::Column::CategoryId.eq(category_id))
                .order_by_asc(subcategories::Column::Name)
                .all(&db_tx)
                .await?;
            Ok((category, subs))
        })
    }

    /// Loads one subcategory.
    pub async fn subcategory(
        &self,
        subcategory_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<subcategories::Model> {
        with_tx!(self, |db_tx| {
            let sub = self.find_subcategory(&db_tx, subcategory_id).await?;
            self.require_category_read(&db_tx, sub.category_id, user_id)
                .await?;
            Ok(sub)
        })
    }

    /// Renames a category.
    pub async fn update_category(
        &self,
        category_id: Uuid,
        name: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let name = normalize_required_name(name, "category")?;
        with_tx!(self, |db_tx| {
            self.require_category_write(&db_tx, category_id, user_id)
                .await?;
            let active = categories::ActiveModel {
                id: ActiveValue::Set(category_id),
                name: ActiveValue::Set(name),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Hides or unhides a category, cascading to every subcategory in the
    /// same storage transaction.
    pub async fn set_category_hidden(
        &self,
        category_id: Uuid,
        hidden: bool,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_category_write(&db_tx, category_id, user_id)
                .await?;

            let active = categories::ActiveModel {
                id: ActiveValue::Set(category_id),
                hidden: ActiveValue::Set(hidden),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            subcategories::Entity::update_many()
                .col_expr(subcategories::Column::Hidden, Expr::value(hidden))
                .filter(subcategories::Column::CategoryId.eq(category_id))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Creates a subcategory under a category the caller can manage.
    pub async fn new_subcategory(
        &self,
        category_id: Uuid,
        name: &str,
        user_id: &str,
    ) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "subcategory")?;
        let id = Uuid::new_v4();
        with_tx!(self, |db_tx| {
            let (category, _) = self
                .require_category_write(&db_tx, category_id, user_id)
                .await?;

            let active = subcategories::ActiveModel {
                id: ActiveValue::Set(id),
                category_id: ActiveValue::Set(category.id),
                name: ActiveValue::Set(name),
                // A child of a hidden parent starts hidden.
                hidden: ActiveValue::Set(category.hidden),
            };
            active.insert(&db_tx).await?;
            Ok(id)
        })
    }

    /// Renames a subcategory.
    pub async fn update_subcategory(
        &self,
        subcategory_id: Uuid,
        name: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let name = normalize_required_name(name, "subcategory")?;
        with_tx!(self, |db_tx| {
            let sub = self
                .find_subcategory(&db_tx, subcategory_id)
                .await?;
            self.require_category_write(&db_tx, sub.category_id, user_id)
                .await?;
            let active = subcategories::ActiveModel {
                id: ActiveValue::Set(subcategory_id),
                name: ActiveValue::Set(name),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Hides or unhides a single subcategory.
    ///
    /// Unhiding under a hidden parent is rejected: a visible subcategory
    /// must never outlive a hidden category.
    pub async fn set_subcategory_hidden(
        &self,
        subcategory_id: Uuid,
        hidden: bool,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let sub = self.find_subcategory(&db_tx, subcategory_id).await?;
            let (category, _) = self
                .require_category_write(&db_tx, sub.category_id, user_id)
                .await?;
            if !hidden && category.hidden {
                return Err(EngineError::Conflict(
                    "cannot unhide a subcategory of a hidden category".to_string(),
                ));
            }
            let active = subcategories::ActiveModel {
                id: ActiveValue::Set(subcategory_id),
                hidden: ActiveValue::Set(hidden),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Counts records still referencing a subcategory.
    pub async fn subcategory_dependents(
        &self,
        subcategory_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<DependentCounts> {
        with_tx!(self, |db_tx| {
            let sub = self.find_subcategory(&db_tx, subcategory_id).await?;
            self.require_category_read(&db_tx, sub.category_id, user_id)
                .await?;
            self.count_dependents(&db_tx, &[subcategory_id]).await
        })
    }

    /// Counts records referencing any subcategory of a category.
    pub async fn category_dependents(
        &self,
        category_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<DependentCounts> {
        with_tx!(self, |db_tx| {
            self.require_category_read(&db_tx, category_id, user_id)
                .await?;
            let sub_ids = self.subcategory_ids(&db_tx, category_id).await?;
            self.count_dependents(&db_tx, &sub_ids).await
        })
    }

    /// Deletes a subcategory. With dependents, `mode` is mandatory.
    pub async fn delete_subcategory(
        &self,
        subcategory_id: Uuid,
        mode: Option<DeleteMode>,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let sub = self.find_subcategory(&db_tx, subcategory_id).await?;
            let (_, scope) = self
                .require_category_write(&db_tx, sub.category_id, user_id)
                .await?;

            self.resolve_dependents(&db_tx, &[subcategory_id], mode, &scope)
                .await?;

            subcategories::Entity::delete_by_id(subcategory_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Deletes a category and its subcategories. With dependents, `mode` is
    /// mandatory; a move target inside the deleted category is rejected.
    pub async fn delete_category(
        &self,
        category_id: Uuid,
        mode: Option<DeleteMode>,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (_, scope) = self
                .require_category_write(&db_tx, category_id, user_id)
                .await?;
            let sub_ids = self.subcategory_ids(&db_tx, category_id).await?;

            if let Some(DeleteMode::MoveTo(target)) = mode
                && sub_ids.contains(&target)
            {
                return Err(EngineError::Conflict(
                    "move target belongs to the deleted category".to_string(),
                ));
            }

            self.resolve_dependents(&db_tx, &sub_ids, mode, &scope)
                .await?;

            subcategories::Entity::delete_many()
                .filter(subcategories::Column::CategoryId.eq(category_id))
                .exec(&db_tx)
                .await?;
            categories::Entity::delete_by_id(category_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    async fn find_subcategory(
        &self,
        db: &DatabaseTransaction,
        subcategory_id: Uuid,
    ) -> ResultEngine<subcategories::Model> {
        subcategories::Entity::find_by_id(subcategory_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("subcategory".to_string()))
    }

    async fn subcategory_ids(
        &self,
        db: &DatabaseTransaction,
        category_id: Uuid,
    ) -> ResultEngine<Vec<Uuid>> {
        Ok(subcategories::Entity::find()
            .filter(subcategories::Column::CategoryId.eq(category_id))
            .all(db)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect())
    }

    async fn count_dependents(
        &self,
        db: &DatabaseTransaction,
        sub_ids: &[Uuid],
    ) -> ResultEngine<DependentCounts> {
        if sub_ids.is_empty() {
            return Ok(DependentCounts::default());
        }
        let transactions = transactions::Entity::find()
            .filter(transactions::Column::SubcategoryId.is_in(sub_ids.to_vec()))
            .count(db)
            .await?;
        let budgets = budgets::Entity::find()
            .filter(budgets::Column::SubcategoryId.is_in(sub_ids.to_vec()))
            .count(db)
            .await?;
        let accounts = accounts::Entity::find()
            .filter(accounts::Column::SubcategoryId.is_in(sub_ids.to_vec()))
            .count(db)
            .await?;
        Ok(DependentCounts {
            transactions,
            budgets,
            accounts,
        })
    }

    /// Applies the chosen delete mode to every dependent record, or fails
    /// with a conflict when dependents exist and no mode was chosen.
    async fn resolve_dependents(
        &self,
        db: &DatabaseTransaction,
        sub_ids: &[Uuid],
        mode: Option<DeleteMode>,
        scope: &Scope,
    ) -> ResultEngine<()> {
        let counts = self.count_dependents(db, sub_ids).await?;
        if counts.is_empty() {
            return Ok(());
        }

        match mode {
            None => Err(EngineError::Conflict(
                "dependent records exist; choose cascade or a move target".to_string(),
            )),
            Some(DeleteMode::Cascade) => {
                transactions::Entity::delete_many()
                    .filter(transactions::Column::SubcategoryId.is_in(sub_ids.to_vec()))
                    .exec(db)
                    .await?;
                budgets::Entity::delete_many()
                    .filter(budgets::Column::SubcategoryId.is_in(sub_ids.to_vec()))
                    .exec(db)
                    .await?;
                accounts::Entity::update_many()
                    .col_expr(
                        accounts::Column::SubcategoryId,
                        Expr::value(Option::<Uuid>::None),
                    )
                    .filter(accounts::Column::SubcategoryId.is_in(sub_ids.to_vec()))
                    .exec(db)
                    .await?;
                Ok(())
            }
            Some(DeleteMode::MoveTo(target)) => {
                if sub_ids.contains(&target) {
                    return Err(EngineError::Conflict(
                        "move target is the deleted subcategory".to_string(),
                    ));
                }
                self.require_subcategory_in_scope(db, target, scope).await?;

                transactions::Entity::update_many()
                    .col_expr(transactions::Column::SubcategoryId, Expr::value(target))
                    .filter(transactions::Column::SubcategoryId.is_in(sub_ids.to_vec()))
                    .exec(db)
                    .await?;
                budgets::Entity::update_many()
                    .col_expr(budgets::Column::SubcategoryId, Expr::value(target))
                    .filter(budgets::Column::SubcategoryId.is_in(sub_ids.to_vec()))
                    .exec(db)
                    .await?;
                accounts::Entity::update_many()
                    .col_expr(accounts::Column::SubcategoryId, Expr::value(target))
                    .filter(accounts::Column::SubcategoryId.is_in(sub_ids.to_vec()))
                    .exec(db)
                    .await?;
                Ok(())
            }
        }
    }
}
