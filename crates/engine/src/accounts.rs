//! Account rows and the credit-card billing configuration.
//!
//! An account is a place money sits (cash, credit card, prepaid card). The
//! optional linked subcategory drives the aggregator's transfer redirection:
//! funding a prepaid card, or paying a credit-card invoice, counts as an
//! expense against that subcategory.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Credit,
    Cash,
    Prepaid,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Cash => "cash",
            Self::Prepaid => "prepaid",
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "credit" => Ok(Self::Credit),
            "cash" => Ok(Self::Cash),
            "prepaid" => Ok(Self::Prepaid),
            other => Err(EngineError::InvalidInput(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

/// When a credit account's purchases hit the budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitMethod {
    /// Each purchase is an expense on its own.
    PerPurchase,
    /// Purchases are counted when the invoice transfer posts.
    Invoice,
}

impl DebitMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerPurchase => "per_purchase",
            Self::Invoice => "invoice",
        }
    }
}

impl TryFrom<&str> for DebitMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "per_purchase" => Ok(Self::PerPurchase),
            "invoice" => Ok(Self::Invoice),
            other => Err(EngineError::InvalidInput(format!(
                "invalid debit method: {other}"
            ))),
        }
    }
}

/// Which calendar month a per-purchase credit expense is budgeted in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMonthBasis {
    TransactionDate,
    DueDate,
}

impl BudgetMonthBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransactionDate => "transaction_date",
            Self::DueDate => "due_date",
        }
    }
}

impl TryFrom<&str> for BudgetMonthBasis {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "transaction_date" => Ok(Self::TransactionDate),
            "due_date" => Ok(Self::DueDate),
            other => Err(EngineError::InvalidInput(format!(
                "invalid budget month basis: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Option<String>,
    pub group_id: Option<Uuid>,
    pub name: String,
    pub kind: String,
    pub subcategory_id: Option<Uuid>,
    pub debit_method: Option<String>,
    pub budget_month_basis: Option<String>,
    pub credit_closing_day: Option<i16>,
    pub credit_due_day: Option<i16>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::account_balances::Entity")]
    Balances,
}

impl Related<super::account_balances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Balances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
