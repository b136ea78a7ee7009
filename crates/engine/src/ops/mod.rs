use sea_orm::DatabaseConnection;

use crate::{EngineError, ResultEngine};

mod access;
mod accounts;
mod aggregate;
mod balance;
mod budgets;
mod categories;
mod groups;
mod transactions;

pub use accounts::{AccountBalanceView, FeedEntry, NewAccount, UpdateAccount};
pub use aggregate::{AggregateBucket, SpendingTotal};
pub use budgets::{BudgetComparison, BudgetFilter, NewBudget};
pub use categories::{DeleteMode, DependentCounts};
pub use transactions::{NewTransaction, TransactionListFilter, UpdateTransaction};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn validate_cycle_day(value: i16, label: &str) -> ResultEngine<i16> {
    if !(1..=31).contains(&value) {
        return Err(EngineError::InvalidInput(format!(
            "{label} must be between 1 and 31"
        )));
    }
    Ok(value)
}

fn validate_month(value: i16) -> ResultEngine<i16> {
    if !(1..=12).contains(&value) {
        return Err(EngineError::InvalidInput(
            "month must be between 1 and 12".to_string(),
        ));
    }
    Ok(value)
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
