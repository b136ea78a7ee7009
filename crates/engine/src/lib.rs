//! The budget engine.
//!
//! Everything the server exposes goes through [`Engine`]: account CRUD and
//! derived balances, hierarchical categories, monthly/annual budgets with
//! automatic annual synchronization, the transaction ledger, and the
//! per-year aggregation that feeds budget reports. All storage access goes
//! through sea-orm; multi-step mutations run inside a single database
//! transaction.

pub use accounts::{AccountKind, BudgetMonthBasis, DebitMethod};
pub use billing::{DueMonth, due_date_month};
pub use categories::CategoryKind;
pub use error::EngineError;
pub use group_members::Capabilities;
pub use ops::{
    AccountBalanceView, AggregateBucket, BudgetComparison, BudgetFilter, DeleteMode,
    DependentCounts, Engine, EngineBuilder, FeedEntry, NewAccount, NewBudget, NewTransaction,
    SpendingTotal, TransactionListFilter, UpdateAccount, UpdateTransaction,
};
pub use scope::Scope;
pub use transactions::TransactionKind;

pub mod account_balances;
pub mod accounts;
mod billing;
pub mod budgets;
pub mod categories;
mod error;
pub mod group_members;
pub mod groups;
mod ops;
mod scope;
pub mod subcategories;
pub mod transactions;
pub mod users;

type ResultEngine<T> = Result<T, EngineError>;
