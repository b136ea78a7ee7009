//! Budget CRUD, monthly/annual synchronization, and budget-vs-actual
//! comparison.
//!
//! Budgets are always personal records: a user plans against a subcategory
//! they can see, whether that subcategory is their own or a group's. Every
//! write runs the annual synchronizer inside the same storage transaction,
//! so a committed budget row and its annual total are never observably out
//! of step.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
    CategoryKind, EngineError, ResultEngine, TransactionKind, budgets, categories,
    subcategories, transactions,
};

use super::{Engine, access::scope_from_columns, validate_month, with_tx};

/// Monthly budgets carry a month (1-12); annual budgets carry none. The
/// budget's kind (expense or income) follows its subcategory's parent
/// category and is not caller-supplied.
#[derive(Clone, Debug)]
pub struct NewBudget {
    pub subcategory_id: Uuid,
    pub year: i32,
    pub month: Option<i16>,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default)]
pub struct BudgetFilter {
    pub year: Option<i32>,
    pub month: Option<i16>,
    pub subcategory_id: Option<Uuid>,
    pub kind: Option<CategoryKind>,
}

/// Planned versus actual spend for one comparison query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetComparison {
    pub budgeted: Decimal,
    pub actual: Decimal,
    /// `budgeted - actual`; positive means under budget.
    pub difference: Decimal,
}

/// Rounding slack when comparing an annual amount against its monthly sum.
fn sync_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

impl Engine {
    /// Creates a budget and re-synchronizes the annual total for its
    /// (subcategory, year) in the same transaction.
    pub async fn new_budget(&self, cmd: NewBudget, user_id: &str) -> ResultEngine<Uuid> {
        if let Some(month) = cmd.month {
            validate_month(month)?;
        }
        if cmd.amount < Decimal::ZERO {
            return Err(EngineError::InvalidInput(
                "budget amount must not be negative".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            let (_, category) = self
                .require_readable_subcategory(&db_tx, cmd.subcategory_id, user_id)
                .await?;

            self.require_budget_slot_free(&db_tx, user_id, cmd.subcategory_id, cmd.year, cmd.month)
                .await?;

            let active = budgets::ActiveModel {
                id: ActiveValue::Set(id),
                user_id: ActiveValue::Set(user_id.to_string()),
                subcategory_id: ActiveValue::Set(cmd.subcategory_id),
                year: ActiveValue::Set(cmd.year),
                month: ActiveValue::Set(cmd.month),
                amount: ActiveValue::Set(cmd.amount),
                kind: ActiveValue::Set(category.kind),
            };
            active.insert(&db_tx).await?;
            self.sync_annual_in_tx(&db_tx, user_id, cmd.subcategory_id, cmd.year)
                .await?;
            Ok(id)
        })
    }

    pub async fn list_budgets(
        &self,
        filter: BudgetFilter,
        user_id: &str,
    ) -> ResultEngine<Vec<budgets::Model>> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            let mut query =
                budgets::Entity::find().filter(budgets::Column::UserId.eq(user_id.to_string()));
            if let Some(year) = filter.year {
                query = query.filter(budgets::Column::Year.eq(year));
            }
            if let Some(month) = filter.month {
                query = query.filter(budgets::Column::Month.eq(month));
            }
            if let Some(subcategory_id) = filter.subcategory_id {
                query = query.filter(budgets::Column::SubcategoryId.eq(subcategory_id));
            }
            if let Some(kind) = filter.kind {
                query = query.filter(budgets::Column::Kind.eq(kind.as_str()));
            }
            let models = query
                .order_by_asc(budgets::Column::Year)
                .order_by_asc(budgets::Column::Month)
                .all(&db_tx)
                .await?;
            Ok(models)
        })
    }

    pub async fn budget(&self, budget_id: Uuid, user_id: &str) -> ResultEngine<budgets::Model> {
        with_tx!(self, |db_tx| {
            self.require_budget(&db_tx, budget_id, user_id).await
        })
    }

    /// Updates a budget's amount and re-synchronizes the annual total.
    pub async fn update_budget(
        &self,
        budget_id: Uuid,
        amount: Decimal,
        user_id: &str,
    ) -> ResultEngine<()> {
        if amount < Decimal::ZERO {
            return Err(EngineError::InvalidInput(
                "budget amount must not be negative".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let model = self.require_budget(&db_tx, budget_id, user_id).await?;
            let active = budgets::ActiveModel {
                id: ActiveValue::Set(budget_id),
                amount: ActiveValue::Set(amount),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            self.sync_annual_in_tx(&db_tx, user_id, model.subcategory_id, model.year)
                .await?;
            Ok(())
        })
    }

    pub async fn delete_budget(&self, budget_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_budget(&db_tx, budget_id, user_id).await?;
            budgets::Entity::delete_by_id(budget_id)
                .exec(&db_tx)
                .await?;
            self.sync_annual_in_tx(&db_tx, user_id, model.subcategory_id, model.year)
                .await?;
            Ok(())
        })
    }

    /// Re-runs the annual synchronization for one (subcategory, year).
    ///
    /// Safe to call at any time: once the annual amount matches the monthly
    /// sum (within tolerance) this is a no-op.
    pub async fn sync_annual_budget(
        &self,
        subcategory_id: Uuid,
        year: i32,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            self.sync_annual_in_tx(&db_tx, user_id, subcategory_id, year)
                .await
        })
    }

    /// Budgeted-vs-actual for a period. With a month the comparison reads
    /// monthly budgets and that month's transactions; without, annual
    /// budgets and the whole year. Transfers never count as actuals.
    pub async fn compare_budget(
        &self,
        year: i32,
        month: Option<i16>,
        subcategory_id: Option<Uuid>,
        kind: Option<CategoryKind>,
        user_id: &str,
    ) -> ResultEngine<BudgetComparison> {
        if let Some(month) = month {
            validate_month(month)?;
        }
        let (window_start, window_end) = period_window(year, month)?;

        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;

            let mut budget_query = budgets::Entity::find()
                .filter(budgets::Column::UserId.eq(user_id.to_string()))
                .filter(budgets::Column::Year.eq(year));
            budget_query = match month {
                Some(month) => budget_query.filter(budgets::Column::Month.eq(month)),
                None => budget_query.filter(budgets::Column::Month.is_null()),
            };
            if let Some(subcategory_id) = subcategory_id {
                budget_query =
                    budget_query.filter(budgets::Column::SubcategoryId.eq(subcategory_id));
            }
            if let Some(kind) = kind {
                budget_query = budget_query.filter(budgets::Column::Kind.eq(kind.as_str()));
            }
            let budgeted: Decimal = budget_query
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|b| b.amount)
                .sum();

            let mut tx_query = transactions::Entity::find()
                .filter(transactions::Column::UserId.eq(user_id.to_string()))
                .filter(transactions::Column::GroupId.is_null())
                .filter(transactions::Column::Kind.ne(TransactionKind::Transfer.as_str()))
                .filter(transactions::Column::OccurredAt.gte(window_start))
                .filter(transactions::Column::OccurredAt.lt(window_end));
            if let Some(subcategory_id) = subcategory_id {
                tx_query = tx_query.filter(transactions::Column::SubcategoryId.eq(subcategory_id));
            }
            if let Some(kind) = kind {
                let tx_kind = match kind {
                    CategoryKind::Expense => TransactionKind::Expense,
                    CategoryKind::Income => TransactionKind::Income,
                };
                tx_query = tx_query.filter(transactions::Column::Kind.eq(tx_kind.as_str()));
            }
            let actual: Decimal = tx_query
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|t| t.amount)
                .sum();

            Ok(BudgetComparison {
                budgeted,
                actual,
                difference: budgeted - actual,
            })
        })
    }

    /// Monthly-to-annual synchronization, inside the caller's transaction.
    ///
    /// When an annual budget and at least one monthly budget exist for the
    /// key and the annual amount drifts from the monthly sum by more than
    /// the rounding tolerance, the annual amount is overwritten with the
    /// sum. Monthly entries are the source of truth once any exist; nothing
    /// flows the other way and no budget row is ever created or deleted
    /// here.
    pub(super) async fn sync_annual_in_tx(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        subcategory_id: Uuid,
        year: i32,
    ) -> ResultEngine<()> {
        let rows = budgets::Entity::find()
            .filter(budgets::Column::UserId.eq(user_id.to_string()))
            .filter(budgets::Column::SubcategoryId.eq(subcategory_id))
            .filter(budgets::Column::Year.eq(year))
            .all(db)
            .await?;

        let mut annual: Option<budgets::Model> = None;
        let mut monthly_sum = Decimal::ZERO;
        let mut monthly_count = 0usize;
        for row in rows {
            match row.month {
                None => annual = Some(row),
                Some(_) => {
                    monthly_sum += row.amount;
                    monthly_count += 1;
                }
            }
        }

        let Some(annual) = annual else { return Ok(()) };
        if monthly_count == 0 {
            return Ok(());
        }
        if (annual.amount - monthly_sum).abs() <= sync_tolerance() {
            return Ok(());
        }

        debug!(
            subcategory = %subcategory_id,
            year,
            from = %annual.amount,
            to = %monthly_sum,
            "annual budget resynchronized from monthly entries"
        );
        let active = budgets::ActiveModel {
            id: ActiveValue::Set(annual.id),
            amount: ActiveValue::Set(monthly_sum),
            ..Default::default()
        };
        active.update(db).await?;
        Ok(())
    }

    async fn require_budget(
        &self,
        db: &DatabaseTransaction,
        budget_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<budgets::Model> {
        let model = budgets::Entity::find_by_id(budget_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("budget".to_string()))?;
        if model.user_id != user_id {
            return Err(EngineError::NotFound("budget".to_string()));
        }
        Ok(model)
    }

    /// At most one annual budget and one monthly budget per month for a
    /// given (user, subcategory, year).
    async fn require_budget_slot_free(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        subcategory_id: Uuid,
        year: i32,
        month: Option<i16>,
    ) -> ResultEngine<()> {
        let mut query = budgets::Entity::find()
            .filter(budgets::Column::UserId.eq(user_id.to_string()))
            .filter(budgets::Column::SubcategoryId.eq(subcategory_id))
            .filter(budgets::Column::Year.eq(year));
        query = match month {
            Some(month) => query.filter(budgets::Column::Month.eq(month)),
            None => query.filter(budgets::Column::Month.is_null()),
        };
        if query.count(db).await? > 0 {
            let label = match month {
                Some(_) => "a monthly budget already exists for this month",
                None => "an annual budget already exists for this year",
            };
            return Err(EngineError::Conflict(label.to_string()));
        }
        Ok(())
    }

    /// Loads a subcategory the caller can see, with its parent category.
    async fn require_readable_subcategory(
        &self,
        db: &DatabaseTransaction,
        subcategory_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(subcategories::Model, categories::Model)> {
        let (sub, category) = subcategories::Entity::find_by_id(subcategory_id)
            .find_also_related(categories::Entity)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("subcategory".to_string()))?;
        let category = category.ok_or_else(|| EngineError::NotFound("category".to_string()))?;
        let scope = scope_from_columns(category.user_id.clone(), category.group_id)?;
        self.require_scope_read(db, &scope, user_id).await?;
        Ok((sub, category))
    }
}

/// `[start, end)` window of one month or one whole year.
fn period_window(year: i32, month: Option<i16>) -> ResultEngine<(DateTime<Utc>, DateTime<Utc>)> {
    let start_month = month.map_or(1, |m| u32::from(m as u16));
    let (end_year, end_month) = match month {
        None => (year + 1, 1),
        Some(12) => (year + 1, 1),
        Some(m) => (year, u32::from(m as u16) + 1),
    };
    let start = Utc
        .with_ymd_and_hms(year, start_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| EngineError::InvalidInput(format!("invalid period: {year}")))?;
    let end = Utc
        .with_ymd_and_hms(end_year, end_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| EngineError::InvalidInput(format!("invalid period: {year}")))?;
    Ok((start, end))
}
