//! Derived account balances.
//!
//! A balance is never stored: it is the latest snapshot (if any) plus every
//! ledger movement strictly after that snapshot's date. An account with no
//! snapshot starts from zero with its full transaction history applied.

use rust_decimal::Decimal;
use sea_orm::{Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{ResultEngine, TransactionKind, account_balances, transactions};

use super::{AccountBalanceView, Engine, with_tx};

impl Engine {
    /// Computes the current balance of an account.
    ///
    /// The result carries the date it is valid as of: the latest of the
    /// baseline snapshot date and the last applied transaction. An account
    /// with no snapshots and no transactions has a zero balance as of now.
    pub async fn current_balance(
        &self,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<AccountBalanceView> {
        with_tx!(self, |db_tx| {
            let (_, scope) = self.require_account_read(&db_tx, account_id, user_id).await?;

            let baseline = account_balances::Entity::find()
                .filter(account_balances::Column::AccountId.eq(account_id))
                .order_by_desc(account_balances::Column::Date)
                .order_by_desc(account_balances::Column::CreatedAt)
                .one(&db_tx)
                .await?;

            let mut movements = transactions::Entity::find()
                .filter(
                    scope.condition(transactions::Column::UserId, transactions::Column::GroupId),
                )
                .filter(
                    Condition::any()
                        .add(transactions::Column::AccountId.eq(account_id))
                        .add(transactions::Column::ToAccountId.eq(account_id)),
                )
                .order_by_asc(transactions::Column::OccurredAt);
            if let Some(snapshot) = &baseline {
                movements =
                    movements.filter(transactions::Column::OccurredAt.gt(snapshot.date));
            }
            let movements = movements.all(&db_tx).await?;

            let (mut amount, mut as_of) = match &baseline {
                Some(snapshot) => (snapshot.amount, Some(snapshot.date)),
                None => (Decimal::ZERO, None),
            };
            for tx in movements {
                let kind = TransactionKind::try_from(tx.kind.as_str())?;
                amount += signed_amount(&tx, kind, account_id);
                as_of = Some(as_of.map_or(tx.occurred_at, |d| d.max(tx.occurred_at)));
            }

            Ok(AccountBalanceView {
                amount,
                as_of: as_of.unwrap_or_else(chrono::Utc::now),
            })
        })
    }
}

/// The effect of one ledger row on a given account's balance. Transfers
/// subtract on the source side and add on the destination side; a transfer
/// from an account to itself nets out.
fn signed_amount(tx: &transactions::Model, kind: TransactionKind, account_id: Uuid) -> Decimal {
    match kind {
        TransactionKind::Income => tx.amount,
        TransactionKind::Expense => -tx.amount,
        TransactionKind::Transfer => {
            let mut delta = Decimal::ZERO;
            if tx.account_id == account_id {
                delta -= tx.amount;
            }
            if tx.to_account_id == Some(account_id) {
                delta += tx.amount;
            }
            delta
        }
    }
}
