use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod account {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccountKind {
        Credit,
        Cash,
        Prepaid,
    }

    impl AccountKind {
        /// Returns the canonical kind string used by the engine/database.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Credit => "credit",
                Self::Cash => "cash",
                Self::Prepaid => "prepaid",
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum DebitMethod {
        PerPurchase,
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

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub name: String,
        pub kind: AccountKind,
        /// Create the account in this group instead of the personal scope.
        pub group_id: Option<Uuid>,
        pub subcategory_id: Option<Uuid>,
        pub debit_method: Option<DebitMethod>,
        pub budget_month_basis: Option<BudgetMonthBasis>,
        pub credit_closing_day: Option<i16>,
        pub credit_due_day: Option<i16>,
    }

    /// Patch body; absent fields stay untouched, `null` clears optionals.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AccountUpdate {
        pub name: Option<String>,
        #[serde(default, with = "super::double_option")]
        pub subcategory_id: Option<Option<Uuid>>,
        #[serde(default, with = "super::double_option")]
        pub debit_method: Option<Option<DebitMethod>>,
        #[serde(default, with = "super::double_option")]
        pub budget_month_basis: Option<Option<BudgetMonthBasis>>,
        #[serde(default, with = "super::double_option")]
        pub credit_closing_day: Option<Option<i16>>,
        #[serde(default, with = "super::double_option")]
        pub credit_due_day: Option<Option<i16>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: Uuid,
        pub name: String,
        pub kind: AccountKind,
        pub group_id: Option<Uuid>,
        pub subcategory_id: Option<Uuid>,
        pub debit_method: Option<DebitMethod>,
        pub budget_month_basis: Option<BudgetMonthBasis>,
        pub credit_closing_day: Option<i16>,
        pub credit_due_day: Option<i16>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountsResponse {
        pub accounts: Vec<AccountView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ListQuery {
        pub group_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub amount: Decimal,
        /// RFC3339 timestamp the balance is valid as of.
        pub as_of: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SnapshotNew {
        pub amount: Decimal,
        pub date: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SnapshotCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SnapshotView {
        pub id: Uuid,
        pub amount: Decimal,
        pub date: DateTime<Utc>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HistoryResponse {
        pub snapshots: Vec<SnapshotView>,
    }

    /// One row of the unified account feed. Real transactions and synthetic
    /// snapshot entries are tagged so clients never confuse the two.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "entry", rename_all = "snake_case")]
    pub enum FeedEntryView {
        Transaction(super::transaction::TransactionView),
        Snapshot(SnapshotView),
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FeedResponse {
        pub entries: Vec<FeedEntryView>,
    }
}

pub mod category {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum CategoryKind {
        Expense,
        Income,
    }

    impl CategoryKind {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Expense => "expense",
                Self::Income => "income",
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryNew {
        pub name: String,
        pub kind: CategoryKind,
        pub group_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryUpdate {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Created {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SubcategoryNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SubcategoryView {
        pub id: Uuid,
        pub name: String,
        pub hidden: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryView {
        pub id: Uuid,
        pub name: String,
        pub kind: CategoryKind,
        pub hidden: bool,
        pub subcategories: Vec<SubcategoryView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoriesResponse {
        pub categories: Vec<CategoryView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ListQuery {
        pub group_id: Option<Uuid>,
        /// Include hidden categories/subcategories (default false).
        pub include_hidden: Option<bool>,
    }

    /// Counts of records still referencing a category or subcategory.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DependentsView {
        pub transactions: u64,
        pub budgets: u64,
        pub accounts: u64,
    }

    /// What to do with dependent records on delete. Required whenever
    /// dependents exist.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "mode", rename_all = "snake_case")]
    pub enum DeleteMode {
        Cascade,
        MoveTo { subcategory_id: Uuid },
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct DeleteRequest {
        #[serde(default, flatten)]
        pub mode: Option<DeleteMode>,
    }
}

pub mod budget {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetNew {
        pub subcategory_id: Uuid,
        pub year: i32,
        /// 1-12 for a monthly budget; absent for the annual budget.
        pub month: Option<i16>,
        pub amount: Decimal,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetUpdate {
        pub amount: Decimal,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetView {
        pub id: Uuid,
        pub subcategory_id: Uuid,
        pub year: i32,
        pub month: Option<i16>,
        pub amount: Decimal,
        pub kind: super::category::CategoryKind,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetsResponse {
        pub budgets: Vec<BudgetView>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ListQuery {
        pub year: Option<i32>,
        pub month: Option<i16>,
        pub subcategory_id: Option<Uuid>,
        pub kind: Option<super::category::CategoryKind>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CompareQuery {
        pub year: i32,
        pub month: Option<i16>,
        pub subcategory_id: Option<Uuid>,
        pub kind: Option<super::category::CategoryKind>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ComparisonView {
        pub budgeted: Decimal,
        pub actual: Decimal,
        /// `budgeted - actual`; positive means under budget.
        pub difference: Decimal,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Expense,
        Income,
        Transfer,
    }

    impl TransactionKind {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Expense => "expense",
                Self::Income => "income",
                Self::Transfer => "transfer",
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub title: String,
        /// Always positive; direction follows the kind.
        pub amount: Decimal,
        pub kind: TransactionKind,
        pub account_id: Uuid,
        pub to_account_id: Option<Uuid>,
        pub subcategory_id: Option<Uuid>,
        pub description: Option<String>,
        /// RFC3339 timestamp.
        pub occurred_at: DateTime<Utc>,
        pub group_id: Option<Uuid>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionUpdate {
        pub title: Option<String>,
        pub amount: Option<Decimal>,
        pub kind: Option<TransactionKind>,
        pub account_id: Option<Uuid>,
        #[serde(default, with = "super::double_option")]
        pub to_account_id: Option<Option<Uuid>>,
        #[serde(default, with = "super::double_option")]
        pub subcategory_id: Option<Option<Uuid>>,
        #[serde(default, with = "super::double_option")]
        pub description: Option<Option<String>>,
        pub occurred_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
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

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionsResponse {
        pub transactions: Vec<TransactionView>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ListQuery {
        pub group_id: Option<Uuid>,
        pub account_id: Option<Uuid>,
        pub subcategory_id: Option<Uuid>,
        pub kind: Option<TransactionKind>,
        pub from: Option<DateTime<Utc>>,
        pub to: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AggregateQuery {
        pub year: i32,
        pub group_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AggregateBucketView {
        pub subcategory_id: Uuid,
        /// 1-12.
        pub month: u32,
        pub year: i32,
        pub kind: TransactionKind,
        pub total: Decimal,
        pub count: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AggregateResponse {
        pub buckets: Vec<AggregateBucketView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SpendingRangeQuery {
        pub from: DateTime<Utc>,
        pub to: DateTime<Utc>,
        pub group_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SpendingTotalView {
        pub subcategory_id: Uuid,
        pub kind: TransactionKind,
        pub total: Decimal,
        pub count: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SpendingRangeResponse {
        pub totals: Vec<SpendingTotalView>,
    }
}

pub mod group {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: Uuid,
        pub name: String,
        pub owner: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupsResponse {
        pub groups: Vec<GroupView>,
    }

    /// Per-member capability flags.
    #[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
    pub struct CapabilitiesView {
        pub manage_accounts: bool,
        pub manage_categories: bool,
        pub manage_budgets: bool,
        pub add_transactions: bool,
        pub view_transactions: bool,
    }

    /// Request body for adding/updating a member.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberUpsert {
        pub username: String,
        pub capabilities: CapabilitiesView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub username: String,
        pub capabilities: CapabilitiesView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MembersResponse {
        pub members: Vec<MemberView>,
    }
}

/// Distinguishes "field absent" from "field set to null" in patch bodies.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
