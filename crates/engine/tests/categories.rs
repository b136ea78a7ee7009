use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, Database, Statement};
use uuid::Uuid;

use engine::{
    AccountKind, CategoryKind, DeleteMode, Engine, EngineError, NewAccount, NewTransaction,
    TransactionKind, TransactionListFilter,
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

async fn category_with_subs(engine: &Engine, name: &str, subs: &[&str]) -> (Uuid, Vec<Uuid>) {
    let category = engine
        .new_category(name, CategoryKind::Expense, None, "alice")
        .await
        .unwrap();
    let mut sub_ids = Vec::new();
    for sub in subs {
        sub_ids.push(
            engine
                .new_subcategory(category, sub, "alice")
                .await
                .unwrap(),
        );
    }
    (category, sub_ids)
}

async fn cash_account(engine: &Engine) -> Uuid {
    engine
        .new_account(
            NewAccount {
                name: "Wallet".to_string(),
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

async fn expense_against(engine: &Engine, account: Uuid, subcategory: Uuid) {
    engine
        .new_transaction(
            NewTransaction {
                title: "expense".to_string(),
                amount: dec!(10),
                kind: TransactionKind::Expense,
                account_id: account,
                to_account_id: None,
                subcategory_id: Some(subcategory),
                description: None,
                occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
                group_id: None,
            },
            "alice",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn hiding_a_category_cascades_to_subcategories() {
    let engine = engine_with_db().await;
    let (category, subs) = category_with_subs(&engine, "Food", &["Groceries", "Eating out"]).await;

    engine
        .set_category_hidden(category, true, "alice")
        .await
        .unwrap();

    let listed = engine.list_categories(None, true, "alice").await.unwrap();
    let (listed_category, listed_subs) =
        listed.into_iter().find(|(c, _)| c.id == category).unwrap();
    assert!(listed_category.hidden);
    assert_eq!(listed_subs.len(), subs.len());
    assert!(listed_subs.iter().all(|s| s.hidden));

    // Hidden entries disappear from the default listing.
    let visible = engine.list_categories(None, false, "alice").await.unwrap();
    assert!(visible.iter().all(|(c, _)| c.id != category));
}

#[tokio::test]
async fn unhiding_cascades_back() {
    let engine = engine_with_db().await;
    let (category, _) = category_with_subs(&engine, "Food", &["Groceries"]).await;

    engine
        .set_category_hidden(category, true, "alice")
        .await
        .unwrap();
    engine
        .set_category_hidden(category, false, "alice")
        .await
        .unwrap();

    let listed = engine.list_categories(None, true, "alice").await.unwrap();
    let (listed_category, listed_subs) =
        listed.into_iter().find(|(c, _)| c.id == category).unwrap();
    assert!(!listed_category.hidden);
    assert!(listed_subs.iter().all(|s| !s.hidden));
}

#[tokio::test]
async fn a_subcategory_cannot_be_unhidden_under_a_hidden_category() {
    let engine = engine_with_db().await;
    let (category, subs) = category_with_subs(&engine, "Food", &["Groceries"]).await;

    engine
        .set_category_hidden(category, true, "alice")
        .await
        .unwrap();
    let err = engine
        .set_subcategory_hidden(subs[0], false, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn new_subcategory_of_a_hidden_category_starts_hidden() {
    let engine = engine_with_db().await;
    let (category, _) = category_with_subs(&engine, "Food", &[]).await;

    engine
        .set_category_hidden(category, true, "alice")
        .await
        .unwrap();
    engine
        .new_subcategory(category, "Groceries", "alice")
        .await
        .unwrap();

    let listed = engine.list_categories(None, true, "alice").await.unwrap();
    let (_, listed_subs) = listed.into_iter().find(|(c, _)| c.id == category).unwrap();
    assert!(listed_subs[0].hidden);
}

#[tokio::test]
async fn dependent_counts_reflect_references() {
    let engine = engine_with_db().await;
    let (_, subs) = category_with_subs(&engine, "Food", &["Groceries"]).await;
    let account = cash_account(&engine).await;

    expense_against(&engine, account, subs[0]).await;
    expense_against(&engine, account, subs[0]).await;

    let counts = engine.subcategory_dependents(subs[0], "alice").await.unwrap();
    assert_eq!(counts.transactions, 2);
    assert_eq!(counts.budgets, 0);
    assert_eq!(counts.accounts, 0);
}

#[tokio::test]
async fn delete_with_dependents_requires_a_mode() {
    let engine = engine_with_db().await;
    let (_, subs) = category_with_subs(&engine, "Food", &["Groceries"]).await;
    let account = cash_account(&engine).await;
    expense_against(&engine, account, subs[0]).await;

    let err = engine
        .delete_subcategory(subs[0], None, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn cascade_delete_removes_dependent_transactions() {
    let engine = engine_with_db().await;
    let (_, subs) = category_with_subs(&engine, "Food", &["Groceries"]).await;
    let account = cash_account(&engine).await;
    expense_against(&engine, account, subs[0]).await;

    engine
        .delete_subcategory(subs[0], Some(DeleteMode::Cascade), "alice")
        .await
        .unwrap();

    let remaining = engine
        .list_transactions(TransactionListFilter::default(), "alice")
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn move_to_repoints_dependent_transactions() {
    let engine = engine_with_db().await;
    let (_, subs) = category_with_subs(&engine, "Food", &["Groceries", "Eating out"]).await;
    let account = cash_account(&engine).await;
    expense_against(&engine, account, subs[0]).await;

    engine
        .delete_subcategory(subs[0], Some(DeleteMode::MoveTo(subs[1])), "alice")
        .await
        .unwrap();

    let remaining = engine
        .list_transactions(TransactionListFilter::default(), "alice")
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].subcategory_id, Some(subs[1]));
}

#[tokio::test]
async fn category_delete_rejects_a_move_target_inside_itself() {
    let engine = engine_with_db().await;
    let (category, subs) = category_with_subs(&engine, "Food", &["Groceries", "Eating out"]).await;
    let account = cash_account(&engine).await;
    expense_against(&engine, account, subs[0]).await;

    let err = engine
        .delete_category(category, Some(DeleteMode::MoveTo(subs[1])), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn cascade_delete_detaches_linked_accounts() {
    let engine = engine_with_db().await;
    let (_, subs) = category_with_subs(&engine, "Transport", &["Transit card"]).await;
    let prepaid = engine
        .new_account(
            NewAccount {
                name: "Transit".to_string(),
                kind: AccountKind::Prepaid,
                group_id: None,
                subcategory_id: Some(subs[0]),
                debit_method: None,
                budget_month_basis: None,
                credit_closing_day: None,
                credit_due_day: None,
            },
            "alice",
        )
        .await
        .unwrap();

    engine
        .delete_subcategory(subs[0], Some(DeleteMode::Cascade), "alice")
        .await
        .unwrap();

    let account = engine.account(prepaid, "alice").await.unwrap();
    assert_eq!(account.subcategory_id, None);
}
