use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, Database, Statement};
use uuid::Uuid;

use engine::{AccountKind, Engine, NewAccount, NewTransaction, TransactionKind};
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

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
}

async fn cash_account(engine: &Engine, name: &str) -> Uuid {
    engine
        .new_account(
            NewAccount {
                name: name.to_string(),
                kind: AccountKind::Cash,
                group_id: None,
                subcategory_id: None,
                debit_method: None,
                budget_month_basis: None,
                credit_closing_day: None,
                credit_due_day: None,
            },
            "alice",
        )
        .await
        .unwrap()
}

async fn record(
    engine: &Engine,
    kind: TransactionKind,
    amount: rust_decimal::Decimal,
    account_id: Uuid,
    to_account_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
) {
    engine
        .new_transaction(
            NewTransaction {
                title: "tx".to_string(),
                amount,
                kind,
                account_id,
                to_account_id,
                subcategory_id: None,
                description: None,
                occurred_at,
                group_id: None,
            },
            "alice",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn balance_is_baseline_plus_movements() {
    let engine = engine_with_db().await;
    let account = cash_account(&engine, "Wallet").await;

    engine
        .add_balance_snapshot(account, dec!(100), day(1), "alice")
        .await
        .unwrap();
    record(&engine, TransactionKind::Income, dec!(50), account, None, day(2)).await;
    record(&engine, TransactionKind::Expense, dec!(30), account, None, day(3)).await;

    let balance = engine.current_balance(account, "alice").await.unwrap();
    assert_eq!(balance.amount, dec!(120));
    assert_eq!(balance.as_of, day(3));
}

#[tokio::test]
async fn balance_is_idempotent_without_writes() {
    let engine = engine_with_db().await;
    let account = cash_account(&engine, "Wallet").await;

    engine
        .add_balance_snapshot(account, dec!(42), day(1), "alice")
        .await
        .unwrap();
    record(&engine, TransactionKind::Income, dec!(8), account, None, day(2)).await;

    let first = engine.current_balance(account, "alice").await.unwrap();
    let second = engine.current_balance(account, "alice").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_account_has_zero_balance() {
    let engine = engine_with_db().await;
    let account = cash_account(&engine, "Wallet").await;

    let balance = engine.current_balance(account, "alice").await.unwrap();
    assert_eq!(balance.amount, dec!(0));
}

#[tokio::test]
async fn transactions_before_baseline_are_ignored() {
    let engine = engine_with_db().await;
    let account = cash_account(&engine, "Wallet").await;

    record(&engine, TransactionKind::Income, dec!(999), account, None, day(1)).await;
    engine
        .add_balance_snapshot(account, dec!(10), day(5), "alice")
        .await
        .unwrap();
    record(&engine, TransactionKind::Income, dec!(5), account, None, day(6)).await;

    let balance = engine.current_balance(account, "alice").await.unwrap();
    assert_eq!(balance.amount, dec!(15));
}

#[tokio::test]
async fn only_the_latest_snapshot_is_the_baseline() {
    let engine = engine_with_db().await;
    let account = cash_account(&engine, "Wallet").await;

    engine
        .add_balance_snapshot(account, dec!(100), day(1), "alice")
        .await
        .unwrap();
    engine
        .add_balance_snapshot(account, dec!(70), day(10), "alice")
        .await
        .unwrap();

    let balance = engine.current_balance(account, "alice").await.unwrap();
    assert_eq!(balance.amount, dec!(70));
    assert_eq!(balance.as_of, day(10));
}

#[tokio::test]
async fn transfer_moves_money_without_changing_the_total() {
    let engine = engine_with_db().await;
    let a = cash_account(&engine, "A").await;
    let b = cash_account(&engine, "B").await;

    engine
        .add_balance_snapshot(a, dec!(100), day(1), "alice")
        .await
        .unwrap();
    engine
        .add_balance_snapshot(b, dec!(100), day(1), "alice")
        .await
        .unwrap();
    record(&engine, TransactionKind::Transfer, dec!(40), a, Some(b), day(2)).await;

    let balance_a = engine.current_balance(a, "alice").await.unwrap();
    let balance_b = engine.current_balance(b, "alice").await.unwrap();
    assert_eq!(balance_a.amount, dec!(60));
    assert_eq!(balance_b.amount, dec!(140));
    assert_eq!(balance_a.amount + balance_b.amount, dec!(200));
}

#[tokio::test]
async fn feed_merges_transactions_and_snapshots_newest_first() {
    let engine = engine_with_db().await;
    let account = cash_account(&engine, "Wallet").await;

    engine
        .add_balance_snapshot(account, dec!(100), day(1), "alice")
        .await
        .unwrap();
    record(&engine, TransactionKind::Income, dec!(10), account, None, day(2)).await;
    engine
        .add_balance_snapshot(account, dec!(110), day(3), "alice")
        .await
        .unwrap();

    let feed = engine.account_feed(account, "alice").await.unwrap();
    assert_eq!(feed.len(), 3);
    assert!(feed.windows(2).all(|w| w[0].date() >= w[1].date()));
    assert!(matches!(feed[0], engine::FeedEntry::Snapshot(_)));
    assert!(matches!(feed[1], engine::FeedEntry::Transaction(_)));
}
