//! Per-year and per-range transaction aggregation.
//!
//! Buckets transactions by subcategory, month, year and kind, applying the
//! redirection rules that keep prepaid and credit accounts from being
//! counted twice: expenses from a prepaid account (or an invoice-debited
//! credit account) are skipped, and the transfer that funds such an account
//! is counted instead, against the account's linked subcategory.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryFilter, TransactionTrait, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AccountKind, BudgetMonthBasis, DebitMethod, EngineError, ResultEngine, Scope,
    TransactionKind, accounts, due_date_month, transactions,
};

use super::{Engine, with_tx};

/// One aggregation bucket: totals for a (subcategory, month, year, kind).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AggregateBucket {
    pub subcategory_id: Uuid,
    /// 1-12.
    pub month: u32,
    pub year: i32,
    pub kind: TransactionKind,
    pub total: Decimal,
    pub count: u64,
}

/// Per-subcategory totals over an arbitrary date window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpendingTotal {
    pub subcategory_id: Uuid,
    pub kind: TransactionKind,
    pub total: Decimal,
    pub count: u64,
}

/// Billing-relevant view of an account, keyed by id during aggregation.
struct AccountProfile {
    kind: AccountKind,
    subcategory_id: Option<Uuid>,
    debit_method: Option<DebitMethod>,
    budget_month_basis: Option<BudgetMonthBasis>,
    credit_closing_day: Option<i16>,
    credit_due_day: Option<i16>,
}

impl AccountProfile {
    fn from_model(model: &accounts::Model) -> ResultEngine<Self> {
        Ok(Self {
            kind: AccountKind::try_from(model.kind.as_str())?,
            subcategory_id: model.subcategory_id,
            debit_method: model
                .debit_method
                .as_deref()
                .map(DebitMethod::try_from)
                .transpose()?,
            budget_month_basis: model
                .budget_month_basis
                .as_deref()
                .map(BudgetMonthBasis::try_from)
                .transpose()?,
            credit_closing_day: model.credit_closing_day,
            credit_due_day: model.credit_due_day,
        })
    }

    /// Whether expenses sourced from this account are counted elsewhere:
    /// prepaid accounts when the funding transfer posts, invoice-debited
    /// credit accounts when the invoice payment posts.
    fn expenses_counted_elsewhere(&self) -> bool {
        self.kind == AccountKind::Prepaid
            || (self.kind == AccountKind::Credit
                && self.debit_method == Some(DebitMethod::Invoice))
    }

    /// The closing/due day pair when due-date attribution applies.
    fn due_date_days(&self) -> Option<(u8, u8)> {
        if self.kind != AccountKind::Credit
            || self.debit_method != Some(DebitMethod::PerPurchase)
            || self.budget_month_basis != Some(BudgetMonthBasis::DueDate)
        {
            return None;
        }
        match (self.credit_closing_day, self.credit_due_day) {
            (Some(closing), Some(due)) => Some((closing as u8, due as u8)),
            _ => None,
        }
    }

    /// A transfer into this account that should be re-attributed as spend:
    /// prepaid accounts and credit accounts with a linked subcategory.
    fn transfer_spend_subcategory(&self) -> Option<Uuid> {
        match self.kind {
            AccountKind::Prepaid => self.subcategory_id,
            AccountKind::Credit => self.subcategory_id,
            AccountKind::Cash => None,
        }
    }
}

impl Engine {
    /// Aggregates a year of transactions into per-subcategory monthly
    /// buckets.
    ///
    /// The query window starts in November of the prior year so that
    /// purchases whose due-date attribution spills into the requested year
    /// are captured; buckets that resolve outside the requested year are
    /// discarded at the end.
    pub async fn aggregate_by_year(
        &self,
        year: i32,
        group_id: Option<Uuid>,
        user_id: &str,
    ) -> ResultEngine<Vec<AggregateBucket>> {
        let window_start = month_start(year - 1, 11)?;
        let window_end = month_start(year + 1, 1)?;
        let scope = Scope::for_caller(user_id, group_id);

        with_tx!(self, |db_tx| {
            self.require_scope_capability(
                &db_tx,
                &scope,
                user_id,
                |c| c.view_transactions,
                "view transactions",
            )
            .await?;

            let txs = transactions::Entity::find()
                .filter(
                    scope.condition(transactions::Column::UserId, transactions::Column::GroupId),
                )
                .filter(transactions::Column::OccurredAt.gte(window_start))
                .filter(transactions::Column::OccurredAt.lt(window_end))
                .all(&db_tx)
                .await?;
            let profiles = self.load_account_profiles(&db_tx, &scope).await?;

            let mut buckets: HashMap<(Uuid, u32, i32, TransactionKind), (Decimal, u64)> =
                HashMap::new();
            for tx in &txs {
                let kind = TransactionKind::try_from(tx.kind.as_str())?;
                match kind {
                    TransactionKind::Transfer => {
                        // A transfer into a prepaid/credit account is the
                        // moment the money actually leaves the budget; count
                        // it as spend against the destination's linked
                        // subcategory, at the transfer's own month.
                        let Some(to_account_id) = tx.to_account_id else {
                            continue;
                        };
                        let Some(profile) = profiles.get(&to_account_id) else {
                            continue;
                        };
                        let Some(subcategory_id) = profile.transfer_spend_subcategory() else {
                            continue;
                        };
                        accumulate(
                            &mut buckets,
                            (
                                subcategory_id,
                                tx.occurred_at.month(),
                                tx.occurred_at.year(),
                                TransactionKind::Expense,
                            ),
                            tx.amount,
                        );
                    }
                    TransactionKind::Expense | TransactionKind::Income => {
                        let Some(subcategory_id) = tx.subcategory_id else {
                            continue;
                        };
                        let profile = profiles.get(&tx.account_id);
                        if kind == TransactionKind::Expense
                            && profile.is_some_and(AccountProfile::expenses_counted_elsewhere)
                        {
                            continue;
                        }

                        let (mut month, mut target_year) =
                            (tx.occurred_at.month(), tx.occurred_at.year());
                        if kind == TransactionKind::Expense
                            && let Some((closing, due)) =
                                profile.and_then(AccountProfile::due_date_days)
                        {
                            let due = due_date_month(&tx.occurred_at.date_naive(), closing, due);
                            month = due.month;
                            target_year = due.year;
                        }

                        accumulate(
                            &mut buckets,
                            (subcategory_id, month, target_year, kind),
                            tx.amount,
                        );
                    }
                }
            }

            let mut out: Vec<AggregateBucket> = buckets
                .into_iter()
                .filter(|((_, _, bucket_year, _), _)| *bucket_year == year)
                .map(|((subcategory_id, month, year, kind), (total, count))| AggregateBucket {
                    subcategory_id,
                    month,
                    year,
                    kind,
                    total,
                    count,
                })
                .collect();
            out.sort_by(|a, b| {
                (a.subcategory_id, a.month, a.kind.as_str())
                    .cmp(&(b.subcategory_id, b.month, b.kind.as_str()))
            });
            Ok(out)
        })
    }

    /// Per-subcategory totals for an arbitrary window, calendar attribution
    /// only (no due-date override), same skip rules as the yearly
    /// aggregation, transfers re-attributed the same way.
    pub async fn spending_by_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        group_id: Option<Uuid>,
        user_id: &str,
    ) -> ResultEngine<Vec<SpendingTotal>> {
        let scope = Scope::for_caller(user_id, group_id);
        with_tx!(self, |db_tx| {
            self.require_scope_capability(
                &db_tx,
                &scope,
                user_id,
                |c| c.view_transactions,
                "view transactions",
            )
            .await?;

            let txs = transactions::Entity::find()
                .filter(
                    scope.condition(transactions::Column::UserId, transactions::Column::GroupId),
                )
                .filter(transactions::Column::OccurredAt.gte(from))
                .filter(transactions::Column::OccurredAt.lt(to))
                .all(&db_tx)
                .await?;
            let profiles = self.load_account_profiles(&db_tx, &scope).await?;

            let mut totals: HashMap<(Uuid, TransactionKind), (Decimal, u64)> = HashMap::new();
            for tx in &txs {
                let kind = TransactionKind::try_from(tx.kind.as_str())?;
                let (subcategory_id, kind) = match kind {
                    TransactionKind::Transfer => {
                        let Some(subcategory_id) = tx
                            .to_account_id
                            .and_then(|id| profiles.get(&id))
                            .and_then(AccountProfile::transfer_spend_subcategory)
                        else {
                            continue;
                        };
                        (subcategory_id, TransactionKind::Expense)
                    }
                    TransactionKind::Expense | TransactionKind::Income => {
                        let Some(subcategory_id) = tx.subcategory_id else {
                            continue;
                        };
                        if kind == TransactionKind::Expense
                            && profiles
                                .get(&tx.account_id)
                                .is_some_and(AccountProfile::expenses_counted_elsewhere)
                        {
                            continue;
                        }
                        (subcategory_id, kind)
                    }
                };
                let entry = totals
                    .entry((subcategory_id, kind))
                    .or_insert((Decimal::ZERO, 0));
                entry.0 += tx.amount;
                entry.1 += 1;
            }

            let mut out: Vec<SpendingTotal> = totals
                .into_iter()
                .map(|((subcategory_id, kind), (total, count))| SpendingTotal {
                    subcategory_id,
                    kind,
                    total,
                    count,
                })
                .collect();
            out.sort_by(|a, b| {
                (a.subcategory_id, a.kind.as_str()).cmp(&(b.subcategory_id, b.kind.as_str()))
            });
            Ok(out)
        })
    }

    async fn load_account_profiles(
        &self,
        db: &sea_orm::DatabaseTransaction,
        scope: &Scope,
    ) -> ResultEngine<HashMap<Uuid, AccountProfile>> {
        let models = accounts::Entity::find()
            .filter(scope.condition(accounts::Column::UserId, accounts::Column::GroupId))
            .all(db)
            .await?;
        let mut profiles = HashMap::with_capacity(models.len());
        for model in &models {
            profiles.insert(model.id, AccountProfile::from_model(model)?);
        }
        Ok(profiles)
    }
}

fn accumulate(
    buckets: &mut HashMap<(Uuid, u32, i32, TransactionKind), (Decimal, u64)>,
    key: (Uuid, u32, i32, TransactionKind),
    amount: Decimal,
) {
    let entry = buckets.entry(key).or_insert((Decimal::ZERO, 0));
    entry.0 += amount;
    entry.1 += 1;
}

/// Midnight UTC on the first of the given month.
fn month_start(year: i32, month: u32) -> ResultEngine<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| EngineError::InvalidInput(format!("invalid year/month: {year}-{month}")))
}
