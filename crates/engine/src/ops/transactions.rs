//! Ledger operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Scope, TransactionKind, accounts, transactions,
};

use super::{Engine, normalize_optional_text, normalize_required_name, with_tx};

#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub title: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub account_id: Uuid,
    pub to_account_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub group_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateTransaction {
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub kind: Option<TransactionKind>,
    pub account_id: Option<Uuid>,
    pub to_account_id: Option<Option<Uuid>>,
    pub subcategory_id: Option<Option<Uuid>>,
    pub description: Option<Option<String>>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Optional narrowing of a transaction listing. All fields are AND-combined.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub group_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub kind: Option<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Engine {
    /// Records a ledger row in the caller's personal scope or a group.
    pub async fn new_transaction(&self, cmd: NewTransaction, user_id: &str) -> ResultEngine<Uuid> {
        let title = normalize_required_name(&cmd.title, "transaction")?;
        validate_shape(cmd.kind, cmd.amount, cmd.to_account_id, cmd.subcategory_id)?;

        let scope = Scope::for_caller(user_id, cmd.group_id);
        let id = Uuid::new_v4();
        with_tx!(self, |db_tx| {
            self.require_scope_capability(
                &db_tx,
                &scope,
                user_id,
                |c| c.add_transactions,
                "add transactions",
            )
            .await?;
            self.require_account_in_scope(&db_tx, cmd.account_id, &scope)
                .await?;
            if let Some(to_account_id) = cmd.to_account_id {
                self.require_account_in_scope(&db_tx, to_account_id, &scope)
                    .await?;
            }
            if let Some(subcategory_id) = cmd.subcategory_id {
                self.require_subcategory_in_scope(&db_tx, subcategory_id, &scope)
                    .await?;
            }

            let active = transactions::ActiveModel {
                id: ActiveValue::Set(id),
                user_id: ActiveValue::Set(user_id.to_string()),
                group_id: ActiveValue::Set(scope.group_id()),
                subcategory_id: ActiveValue::Set(cmd.subcategory_id),
                account_id: ActiveValue::Set(cmd.account_id),
                to_account_id: ActiveValue::Set(cmd.to_account_id),
                title: ActiveValue::Set(title),
                amount: ActiveValue::Set(cmd.amount),
                description: ActiveValue::Set(normalize_optional_text(
                    cmd.description.as_deref(),
                )),
                occurred_at: ActiveValue::Set(cmd.occurred_at),
                kind: ActiveValue::Set(cmd.kind.as_str().to_string()),
            };
            active.insert(&db_tx).await?;
            Ok(id)
        })
    }

    /// Lists transactions in one ownership scope, newest first.
    pub async fn list_transactions(
        &self,
        filter: TransactionListFilter,
        user_id: &str,
    ) -> ResultEngine<Vec<transactions::Model>> {
        let scope = Scope::for_caller(user_id, filter.group_id);
        with_tx!(self, |db_tx| {
            self.require_scope_capability(
                &db_tx,
                &scope,
                user_id,
                |c| c.view_transactions,
                "view transactions",
            )
            .await?;

            let mut query = transactions::Entity::find().filter(
                scope.condition(transactions::Column::UserId, transactions::Column::GroupId),
            );
            if let Some(account_id) = filter.account_id {
                query = query.filter(
                    Condition::any()
                        .add(transactions::Column::AccountId.eq(account_id))
                        .add(transactions::Column::ToAccountId.eq(account_id)),
                );
            }
            if let Some(subcategory_id) = filter.subcategory_id {
                query = query.filter(transactions::Column::SubcategoryId.eq(subcategory_id));
            }
            if let Some(kind) = filter.kind {
                query = query.filter(transactions::Column::Kind.eq(kind.as_str()));
            }
            if let Some(from) = filter.from {
                query = query.filter(transactions::Column::OccurredAt.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(transactions::Column::OccurredAt.lt(to));
            }

            let models = query
                .order_by_desc(transactions::Column::OccurredAt)
                .all(&db_tx)
                .await?;
            Ok(models)
        })
    }

    pub async fn transaction(
        &self,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<transactions::Model> {
        with_tx!(self, |db_tx| {
            let (model, _) = self
                .require_transaction(&db_tx, transaction_id, user_id, |c| c.view_transactions)
                .await?;
            Ok(model)
        })
    }

    /// Updates a ledger row. The combined shape (kind, destination account,
    /// subcategory) is re-validated after the patch is applied.
    pub async fn update_transaction(
        &self,
        transaction_id: Uuid,
        cmd: UpdateTransaction,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (model, scope) = self
                .require_transaction(&db_tx, transaction_id, user_id, |c| c.add_transactions)
                .await?;

            let kind = match cmd.kind {
                Some(kind) => kind,
                None => TransactionKind::try_from(model.kind.as_str())?,
            };
            let amount = cmd.amount.unwrap_or(model.amount);
            let account_id = cmd.account_id.unwrap_or(model.account_id);
            let to_account_id = cmd.to_account_id.unwrap_or(model.to_account_id);
            let subcategory_id = cmd.subcategory_id.unwrap_or(model.subcategory_id);
            validate_shape(kind, amount, to_account_id, subcategory_id)?;

            self.require_account_in_scope(&db_tx, account_id, &scope)
                .await?;
            if let Some(to_account_id) = to_account_id {
                self.require_account_in_scope(&db_tx, to_account_id, &scope)
                    .await?;
            }
            if let Some(subcategory_id) = subcategory_id {
                self.require_subcategory_in_scope(&db_tx, subcategory_id, &scope)
                    .await?;
            }

            let mut active = transactions::ActiveModel {
                id: ActiveValue::Set(transaction_id),
                amount: ActiveValue::Set(amount),
                kind: ActiveValue::Set(kind.as_str().to_string()),
                account_id: ActiveValue::Set(account_id),
                to_account_id: ActiveValue::Set(to_account_id),
                subcategory_id: ActiveValue::Set(subcategory_id),
                ..Default::default()
            };
            if let Some(title) = cmd.title {
                active.title = ActiveValue::Set(normalize_required_name(&title, "transaction")?);
            }
            if let Some(description) = cmd.description {
                active.description =
                    ActiveValue::Set(normalize_optional_text(description.as_deref()));
            }
            if let Some(occurred_at) = cmd.occurred_at {
                active.occurred_at = ActiveValue::Set(occurred_at);
            }
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    pub async fn delete_transaction(
        &self,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_transaction(&db_tx, transaction_id, user_id, |c| c.add_transactions)
                .await?;
            transactions::Entity::delete_by_id(transaction_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Loads a transaction visible to the caller and checks the required
    /// capability for its scope.
    async fn require_transaction(
        &self,
        db: &DatabaseTransaction,
        transaction_id: Uuid,
        user_id: &str,
        capability: fn(&crate::Capabilities) -> bool,
    ) -> ResultEngine<(transactions::Model, Scope)> {
        let model = transactions::Entity::find_by_id(transaction_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("transaction".to_string()))?;
        let scope = match model.group_id {
            Some(group_id) => Scope::group(group_id),
            None => Scope::personal(&model.user_id),
        };
        let caps = self.require_scope_read(db, &scope, user_id).await?;
        if !capability(&caps) {
            return Err(EngineError::Forbidden("access transactions".to_string()));
        }
        Ok((model, scope))
    }

    /// Resolves an account and checks it lives in the expected ownership
    /// scope. A cross-scope account reference is a conflict, not a missing
    /// record.
    async fn require_account_in_scope(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        scope: &Scope,
    ) -> ResultEngine<accounts::Model> {
        let model = accounts::Entity::find_by_id(account_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
        let account_scope =
            super::access::scope_from_columns(model.user_id.clone(), model.group_id)?;
        if account_scope != *scope {
            return Err(EngineError::Conflict(
                "account belongs to a different ownership scope".to_string(),
            ));
        }
        Ok(model)
    }
}

/// Shape invariants of a ledger row.
///
/// Amounts are strictly positive. Transfers name a destination account and
/// never a subcategory; income and expense never name a destination.
fn validate_shape(
    kind: TransactionKind,
    amount: Decimal,
    to_account_id: Option<Uuid>,
    subcategory_id: Option<Uuid>,
) -> ResultEngine<()> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidInput(
            "amount must be positive".to_string(),
        ));
    }
    match kind {
        TransactionKind::Transfer => {
            if to_account_id.is_none() {
                return Err(EngineError::InvalidInput(
                    "transfer requires a destination account".to_string(),
                ));
            }
            if subcategory_id.is_some() {
                return Err(EngineError::InvalidInput(
                    "transfer cannot carry a subcategory".to_string(),
                ));
            }
        }
        TransactionKind::Expense | TransactionKind::Income => {
            if to_account_id.is_some() {
                return Err(EngineError::InvalidInput(
                    "destination account is only valid on transfers".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn transfer_requires_destination() {
        let err = validate_shape(TransactionKind::Transfer, dec!(10), None, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn transfer_rejects_subcategory() {
        let err = validate_shape(
            TransactionKind::Transfer,
            dec!(10),
            Some(Uuid::new_v4()),
            Some(Uuid::new_v4()),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn expense_rejects_destination() {
        let err = validate_shape(
            TransactionKind::Expense,
            dec!(10),
            Some(Uuid::new_v4()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn amount_must_be_positive() {
        let err = validate_shape(TransactionKind::Income, dec!(0), None, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
