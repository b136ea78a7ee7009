//! Account CRUD, balance snapshots, and the unified account feed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AccountKind, BudgetMonthBasis, DebitMethod, EngineError, ResultEngine, Scope,
    account_balances, accounts, transactions,
};

use super::{Engine, normalize_required_name, validate_cycle_day, with_tx};

#[derive(Clone, Debug)]
pub struct NewAccount {
    pub name: String,
    pub kind: AccountKind,
    pub group_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub debit_method: Option<DebitMethod>,
    pub budget_month_basis: Option<BudgetMonthBasis>,
    pub credit_closing_day: Option<i16>,
    pub credit_due_day: Option<i16>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateAccount {
    pub name: Option<String>,
    pub subcategory_id: Option<Option<Uuid>>,
    pub debit_method: Option<Option<DebitMethod>>,
    pub budget_month_basis: Option<Option<BudgetMonthBasis>>,
    pub credit_closing_day: Option<Option<i16>>,
    pub credit_due_day: Option<Option<i16>>,
}

/// Derived balance of an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalanceView {
    pub amount: Decimal,
    pub as_of: DateTime<Utc>,
}

/// One row of the unified account feed: a real ledger movement or a
/// synthetic entry for a balance snapshot. The discriminant keeps the two
/// apart so nothing downstream mistakes a snapshot for a transaction.
#[derive(Clone, Debug)]
pub enum FeedEntry {
    Transaction(transactions::Model),
    Snapshot(account_balances::Model),
}

impl FeedEntry {
    pub fn date(&self) -> DateTime<Utc> {
        match self {
            Self::Transaction(tx) => tx.occurred_at,
            Self::Snapshot(snapshot) => snapshot.date,
        }
    }
}

impl Engine {
    /// Creates an account in the caller's personal scope or a group.
    pub async fn new_account(&self, cmd: NewAccount, user_id: &str) -> ResultEngine<Uuid> {
        let name = normalize_required_name(&cmd.name, "account")?;
        validate_credit_fields(
            cmd.kind,
            cmd.debit_method,
            cmd.budget_month_basis,
            cmd.credit_closing_day,
            cmd.credit_due_day,
        )?;

        let scope = Scope::for_caller(user_id, cmd.group_id);
        let id = Uuid::new_v4();
        with_tx!(self, |db_tx| {
            self.require_scope_capability(
                &db_tx,
                &scope,
                user_id,
                |c| c.manage_accounts,
                "manage accounts",
            )
            .await?;
            if let Some(subcategory_id) = cmd.subcategory_id {
                self.require_subcategory_in_scope(&db_tx, subcategory_id, &scope)
                    .await?;
            }

            let (owner_user, owner_group) = scope.columns();
            let active = accounts::ActiveModel {
                id: ActiveValue::Set(id),
                user_id: ActiveValue::Set(owner_user),
                group_id: ActiveValue::Set(owner_group),
                name: ActiveValue::Set(name),
                kind: ActiveValue::Set(cmd.kind.as_str().to_string()),
                subcategory_id: ActiveValue::Set(cmd.subcategory_id),
                debit_method: ActiveValue::Set(
                    cmd.debit_method.map(|m| m.as_str().to_string()),
                ),
                budget_month_basis: ActiveValue::Set(
                    cmd.budget_month_basis.map(|b| b.as_str().to_string()),
                ),
                credit_closing_day: ActiveValue::Set(cmd.credit_closing_day),
                credit_due_day: ActiveValue::Set(cmd.credit_due_day),
            };
            active.insert(&db_tx).await?;
            Ok(id)
        })
    }

    /// Lists accounts in one ownership scope.
    pub async fn list_accounts(
        &self,
        group_id: Option<Uuid>,
        user_id: &str,
    ) -> ResultEngine<Vec<accounts::Model>> {
        let scope = Scope::for_caller(user_id, group_id);
        with_tx!(self, |db_tx| {
            self.require_scope_read(&db_tx, &scope, user_id).await?;
            let models = accounts::Entity::find()
                .filter(scope.condition(accounts::Column::UserId, accounts::Column::GroupId))
                .order_by_asc(accounts::Column::Name)
                .all(&db_tx)
                .await?;
            Ok(models)
        })
    }

    pub async fn account(&self, account_id: Uuid, user_id: &str) -> ResultEngine<accounts::Model> {
        with_tx!(self, |db_tx| {
            let (model, _) = self.require_account_read(&db_tx, account_id, user_id).await?;
            Ok(model)
        })
    }

    /// Updates account fields. Credit configuration is re-validated against
    /// the stored account kind.
    pub async fn update_account(
        &self,
        account_id: Uuid,
        cmd: UpdateAccount,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (model, scope) = self
                .require_account_write(&db_tx, account_id, user_id)
                .await?;
            let kind = AccountKind::try_from(model.kind.as_str())?;

            let debit_method = match cmd.debit_method {
                Some(value) => value,
                None => model
                    .debit_method
                    .as_deref()
                    .map(DebitMethod::try_from)
                    .transpose()?,
            };
            let budget_month_basis = match cmd.budget_month_basis {
                Some(value) => value,
                None => model
                    .budget_month_basis
                    .as_deref()
                    .map(BudgetMonthBasis::try_from)
                    .transpose()?,
            };
            let closing_day = cmd.credit_closing_day.unwrap_or(model.credit_closing_day);
            let due_day = cmd.credit_due_day.unwrap_or(model.credit_due_day);
            validate_credit_fields(kind, debit_method, budget_month_basis, closing_day, due_day)?;

            let subcategory_id = match cmd.subcategory_id {
                Some(value) => {
                    if let Some(subcategory_id) = value {
                        self.require_subcategory_in_scope(&db_tx, subcategory_id, &scope)
                            .await?;
                    }
                    value
                }
                None => model.subcategory_id,
            };

            let mut active = accounts::ActiveModel {
                id: ActiveValue::Set(account_id),
                subcategory_id: ActiveValue::Set(subcategory_id),
                debit_method: ActiveValue::Set(debit_method.map(|m| m.as_str().to_string())),
                budget_month_basis: ActiveValue::Set(
                    budget_month_basis.map(|b| b.as_str().to_string()),
                ),
                credit_closing_day: ActiveValue::Set(closing_day),
                credit_due_day: ActiveValue::Set(due_day),
                ..Default::default()
            };
            if let Some(name) = cmd.name {
                active.name = ActiveValue::Set(normalize_required_name(&name, "account")?);
            }
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Deletes an account. Accounts still referenced by transactions cannot
    /// be deleted; the ledger is never silently truncated.
    pub async fn delete_account(&self, account_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_account_write(&db_tx, account_id, user_id)
                .await?;

            let referenced = transactions::Entity::find()
                .filter(
                    Condition::any()
                        .add(transactions::Column::AccountId.eq(account_id))
                        .add(transactions::Column::ToAccountId.eq(account_id)),
                )
                .count(&db_tx)
                .await?;
            if referenced > 0 {
                return Err(EngineError::Conflict(
                    "account has transactions; delete or move them first".to_string(),
                ));
            }

            account_balances::Entity::delete_many()
                .filter(account_balances::Column::AccountId.eq(account_id))
                .exec(&db_tx)
                .await?;
            accounts::Entity::delete_by_id(account_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Appends a balance snapshot.
    pub async fn add_balance_snapshot(
        &self,
        account_id: Uuid,
        amount: Decimal,
        date: DateTime<Utc>,
        user_id: &str,
    ) -> ResultEngine<Uuid> {
        let id = Uuid::new_v4();
        with_tx!(self, |db_tx| {
            self.require_account_write(&db_tx, account_id, user_id)
                .await?;
            let active = account_balances::ActiveModel {
                id: ActiveValue::Set(id),
                account_id: ActiveValue::Set(account_id),
                amount: ActiveValue::Set(amount),
                date: ActiveValue::Set(date),
                created_at: ActiveValue::Set(Utc::now()),
            };
            active.insert(&db_tx).await?;
            Ok(id)
        })
    }

    /// Corrects an existing snapshot row.
    pub async fn update_balance_snapshot(
        &self,
        snapshot_id: Uuid,
        amount: Decimal,
        date: DateTime<Utc>,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let snapshot = self.find_snapshot(&db_tx, snapshot_id).await?;
            self.require_account_write(&db_tx, snapshot.account_id, user_id)
                .await?;
            let active = account_balances::ActiveModel {
                id: ActiveValue::Set(snapshot_id),
                amount: ActiveValue::Set(amount),
                date: ActiveValue::Set(date),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    pub async fn delete_balance_snapshot(
        &self,
        snapshot_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let snapshot = self.find_snapshot(&db_tx, snapshot_id).await?;
            self.require_account_write(&db_tx, snapshot.account_id, user_id)
                .await?;
            account_balances::Entity::delete_by_id(snapshot_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Snapshot history, newest first.
    pub async fn balance_history(
        &self,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<account_balances::Model>> {
        with_tx!(self, |db_tx| {
            self.require_account_read(&db_tx, account_id, user_id)
                .await?;
            let models = account_balances::Entity::find()
                .filter(account_balances::Column::AccountId.eq(account_id))
                .order_by_desc(account_balances::Column::Date)
                .all(&db_tx)
                .await?;
            Ok(models)
        })
    }

    /// Unified feed of ledger movements and balance snapshots for an
    /// account, newest first. Snapshots stay a distinct variant; they are
    /// merged with transactions only here, at the query boundary.
    pub async fn account_feed(
        &self,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<FeedEntry>> {
        with_tx!(self, |db_tx| {
            let (_, scope) = self.require_account_read(&db_tx, account_id, user_id).await?;

            let txs = transactions::Entity::find()
                .filter(
                    scope.condition(transactions::Column::UserId, transactions::Column::GroupId),
                )
                .filter(
                    Condition::any()
                        .add(transactions::Column::AccountId.eq(account_id))
                        .add(transactions::Column::ToAccountId.eq(account_id)),
                )
                .all(&db_tx)
                .await?;
            let snapshots = account_balances::Entity::find()
                .filter(account_balances::Column::AccountId.eq(account_id))
                .all(&db_tx)
                .await?;

            let mut feed: Vec<FeedEntry> = txs
                .into_iter()
                .map(FeedEntry::Transaction)
                .chain(snapshots.into_iter().map(FeedEntry::Snapshot))
                .collect();
            feed.sort_by_key(|entry| std::cmp::Reverse(entry.date()));
            Ok(feed)
        })
    }

    async fn find_snapshot(
        &self,
        db: &DatabaseTransaction,
        snapshot_id: Uuid,
    ) -> ResultEngine<account_balances::Model> {
        account_balances::Entity::find_by_id(snapshot_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("balance snapshot".to_string()))
    }
}

/// Credit configuration is only meaningful on credit accounts; cycle days
/// must be calendar-plausible (1-31).
fn validate_credit_fields(
    kind: AccountKind,
    debit_method: Option<DebitMethod>,
    budget_month_basis: Option<BudgetMonthBasis>,
    closing_day: Option<i16>,
    due_day: Option<i16>,
) -> ResultEngine<()> {
    if kind != AccountKind::Credit
        && (debit_method.is_some()
            || budget_month_basis.is_some()
            || closing_day.is_some()
            || due_day.is_some())
    {
        return Err(EngineError::InvalidInput(
            "credit configuration requires a credit account".to_string(),
        ));
    }
    if let Some(day) = closing_day {
        validate_cycle_day(day, "closing day")?;
    }
    if let Some(day) = due_day {
        validate_cycle_day(day, "due day")?;
    }
    Ok(())
}
