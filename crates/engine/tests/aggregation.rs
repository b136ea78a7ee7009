use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, Database, Statement};
use uuid::Uuid;

use engine::{
    AccountKind, BudgetMonthBasis, DebitMethod, Engine, NewAccount, NewTransaction,
    TransactionKind,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec!["alice".into(), "password".into()],
    ))
    .await
    .unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

async fn subcategory(engine: &Engine, category: &str, name: &str) -> Uuid {
    let category = engine
        .new_category(category, engine::CategoryKind::Expense, None, "alice")
        .await
        .unwrap();
    engine
        .new_subcategory(category, name, "alice")
        .await
        .unwrap()
}

async fn account(engine: &Engine, cmd: NewAccount) -> Uuid {
    engine.new_account(cmd, "alice").await.unwrap()
}

fn cash(name: &str) -> NewAccount {
    NewAccount {
        name: name.to_string(),
        kind: AccountKind::Cash,
        group_id: None,
        subcategory_id: None,
        debit_method: None,
        budget_month_basis: None,
        credit_closing_day: None,
        credit_due_day: None,
    }
}

async fn expense(
    engine: &Engine,
    amount: rust_decimal::Decimal,
    account_id: Uuid,
    subcategory_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
) {
    engine
        .new_transaction(
            NewTransaction {
                title: "expense".to_string(),
                amount,
                kind: TransactionKind::Expense,
                account_id,
                to_account_id: None,
                subcategory_id,
                description: None,
                occurred_at,
                group_id: None,
            },
            "alice",
        )
        .await
        .unwrap();
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
}

#[tokio::test]
async fn one_bucket_per_subcategory_month_and_kind() {
    let engine = engine_with_db().await;
    let groceries = subcategory(&engine, "Food", "Groceries").await;
    let fuel = subcategory(&engine, "Car", "Fuel").await;
    let wallet = account(&engine, cash("Wallet")).await;

    expense(&engine, dec!(10), wallet, Some(groceries), at(2024, 1, 5)).await;
    expense(&engine, dec!(20), wallet, Some(groceries), at(2024, 1, 25)).await;
    expense(&engine, dec!(30), wallet, Some(groceries), at(2024, 2, 5)).await;
    expense(&engine, dec!(40), wallet, Some(fuel), at(2024, 2, 10)).await;

    let buckets = engine.aggregate_by_year(2024, None, "alice").await.unwrap();
    assert_eq!(buckets.len(), 3);

    let january_groceries = buckets
        .iter()
        .find(|b| b.subcategory_id == groceries && b.month == 1)
        .unwrap();
    assert_eq!(january_groceries.total, dec!(30));
    assert_eq!(january_groceries.count, 2);
    assert_eq!(january_groceries.kind, TransactionKind::Expense);

    let february_fuel = buckets
        .iter()
        .find(|b| b.subcategory_id == fuel && b.month == 2)
        .unwrap();
    assert_eq!(february_fuel.total, dec!(40));
    assert_eq!(february_fuel.count, 1);
}

#[tokio::test]
async fn transactions_without_subcategory_are_skipped() {
    let engine = engine_with_db().await;
    let wallet = account(&engine, cash("Wallet")).await;

    expense(&engine, dec!(10), wallet, None, at(2024, 1, 5)).await;

    let buckets = engine.aggregate_by_year(2024, None, "alice").await.unwrap();
    assert!(buckets.is_empty());
}

#[tokio::test]
async fn due_date_attribution_shifts_credit_purchases() {
    let engine = engine_with_db().await;
    let groceries = subcategory(&engine, "Food", "Groceries").await;
    let card = account(
        &engine,
        NewAccount {
            name: "Card".to_string(),
            kind: AccountKind::Credit,
            group_id: None,
            subcategory_id: None,
            debit_method: Some(DebitMethod::PerPurchase),
            budget_month_basis: Some(BudgetMonthBasis::DueDate),
            credit_closing_day: Some(20),
            credit_due_day: Some(10),
        },
    )
    .await;

    // Before the closing day: closes in March, due in April.
    expense(&engine, dec!(15), card, Some(groceries), at(2024, 3, 15)).await;
    // After the closing day: closes in April, due in May.
    expense(&engine, dec!(25), card, Some(groceries), at(2024, 3, 25)).await;

    let buckets = engine.aggregate_by_year(2024, None, "alice").await.unwrap();
    let months: Vec<u32> = buckets.iter().map(|b| b.month).collect();
    assert_eq!(months, vec![4, 5]);
    assert_eq!(buckets[0].total, dec!(15));
    assert_eq!(buckets[1].total, dec!(25));
}

#[tokio::test]
async fn due_date_spillover_lands_in_the_next_year() {
    let engine = engine_with_db().await;
    let groceries = subcategory(&engine, "Food", "Groceries").await;
    let card = account(
        &engine,
        NewAccount {
            name: "Card".to_string(),
            kind: AccountKind::Credit,
            group_id: None,
            subcategory_id: None,
            debit_method: Some(DebitMethod::PerPurchase),
            budget_month_basis: Some(BudgetMonthBasis::DueDate),
            credit_closing_day: Some(20),
            credit_due_day: Some(10),
        },
    )
    .await;

    // December 28th: closes in January, due in February of the next year.
    expense(&engine, dec!(80), card, Some(groceries), at(2024, 12, 28)).await;

    let this_year = engine.aggregate_by_year(2024, None, "alice").await.unwrap();
    assert!(this_year.is_empty());

    let next_year = engine.aggregate_by_year(2025, None, "alice").await.unwrap();
    assert_eq!(next_year.len(), 1);
    assert_eq!(next_year[0].month, 2);
    assert_eq!(next_year[0].year, 2025);
    assert_eq!(next_year[0].total, dec!(80));
}

#[tokio::test]
async fn prepaid_expenses_count_once_via_the_funding_transfer() {
    let engine = engine_with_db().await;
    let transport = subcategory(&engine, "Transport", "Transit card").await;
    let wallet = account(&engine, cash("Wallet")).await;
    let prepaid = account(
        &engine,
        NewAccount {
            name: "Transit".to_string(),
            kind: AccountKind::Prepaid,
            group_id: None,
            subcategory_id: Some(transport),
            debit_method: None,
            budget_month_basis: None,
            credit_closing_day: None,
            credit_due_day: None,
        },
    )
    .await;

    // Funding the prepaid card is the real outflow.
    engine
        .new_transaction(
            NewTransaction {
                title: "top up".to_string(),
                amount: dec!(50),
                kind: TransactionKind::Transfer,
                account_id: wallet,
                to_account_id: Some(prepaid),
                subcategory_id: None,
                description: None,
                occurred_at: at(2024, 5, 2),
                group_id: None,
            },
            "alice",
        )
        .await
        .unwrap();
    // Spending from the prepaid card must not count again.
    expense(&engine, dec!(30), prepaid, Some(transport), at(2024, 5, 10)).await;

    let buckets = engine.aggregate_by_year(2024, None, "alice").await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].subcategory_id, transport);
    assert_eq!(buckets[0].month, 5);
    assert_eq!(buckets[0].kind, TransactionKind::Expense);
    assert_eq!(buckets[0].total, dec!(50));
    assert_eq!(buckets[0].count, 1);
}

#[tokio::test]
async fn invoice_credit_expenses_are_excluded() {
    let engine = engine_with_db().await;
    let groceries = subcategory(&engine, "Food", "Groceries").await;
    let card = account(
        &engine,
        NewAccount {
            name: "Card".to_string(),
            kind: AccountKind::Credit,
            group_id: None,
            subcategory_id: None,
            debit_method: Some(DebitMethod::Invoice),
            budget_month_basis: None,
            credit_closing_day: None,
            credit_due_day: None,
        },
    )
    .await;

    expense(&engine, dec!(60), card, Some(groceries), at(2024, 6, 6)).await;

    let buckets = engine.aggregate_by_year(2024, None, "alice").await.unwrap();
    assert!(buckets.is_empty());
}

#[tokio::test]
async fn spending_by_range_totals_per_subcategory() {
    let engine = engine_with_db().await;
    let groceries = subcategory(&engine, "Food", "Groceries").await;
    let wallet = account(&engine, cash("Wallet")).await;

    expense(&engine, dec!(10), wallet, Some(groceries), at(2024, 1, 5)).await;
    expense(&engine, dec!(20), wallet, Some(groceries), at(2024, 2, 5)).await;
    // Outside the window.
    expense(&engine, dec!(99), wallet, Some(groceries), at(2024, 4, 1)).await;

    let totals = engine
        .spending_by_range(at(2024, 1, 1), at(2024, 3, 1), None, "alice")
        .await
        .unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].subcategory_id, groceries);
    assert_eq!(totals[0].total, dec!(30));
    assert_eq!(totals[0].count, 2);
}
