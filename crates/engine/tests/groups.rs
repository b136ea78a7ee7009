use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, Database, Statement};
use uuid::Uuid;

use engine::{
    AccountKind, Capabilities, CategoryKind, Engine, EngineError, NewAccount, NewTransaction,
    TransactionKind, TransactionListFilter,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for user in ["alice", "bob", "carol"] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password) VALUES (?, ?)",
            vec![user.into(), "password".into()],
        ))
        .await
        .unwrap();
    }
    Engine::builder().database(db).build().await.unwrap()
}

/// A group owned by alice with a shared cash account and subcategory.
async fn household(engine: &Engine) -> (Uuid, Uuid, Uuid) {
    let group = engine.new_group("Household", "alice").await.unwrap();
    let category = engine
        .new_category("Food", CategoryKind::Expense, Some(group), "alice")
        .await
        .unwrap();
    let subcategory = engine
        .new_subcategory(category, "Groceries", "alice")
        .await
        .unwrap();
    let account = engine
        .new_account(
            NewAccount {
                name: "Joint wallet".to_string(),
                kind: AccountKind::Cash,
                group_id: Some(group),
                subcategory_id: None,
                debit_method: None,
                budget_month_basis: None,
                credit_closing_day: None,
                credit_due_day: None,
            },
            "alice",
        )
        .await
        .unwrap();
    (group, account, subcategory)
}

fn grocery_run(group: Uuid, account: Uuid, subcategory: Uuid) -> NewTransaction {
    NewTransaction {
        title: "groceries".to_string(),
        amount: dec!(25),
        kind: TransactionKind::Expense,
        account_id: account,
        to_account_id: None,
        subcategory_id: Some(subcategory),
        description: None,
        occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        group_id: Some(group),
    }
}

#[tokio::test]
async fn listing_includes_owned_and_joined_groups() {
    let engine = engine_with_db().await;
    let owned = engine.new_group("Mine", "alice").await.unwrap();
    let joined = engine.new_group("Theirs", "bob").await.unwrap();
    engine
        .upsert_group_member(joined, "alice", Capabilities::all(), "bob")
        .await
        .unwrap();

    let groups = engine.list_groups("alice").await.unwrap();
    let ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();
    assert!(ids.contains(&owned));
    assert!(ids.contains(&joined));

    let bobs = engine.list_groups("bob").await.unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].id, joined);
}

#[tokio::test]
async fn group_records_are_invisible_to_non_members() {
    let engine = engine_with_db().await;
    let (group, account, subcategory) = household(&engine).await;
    engine
        .new_transaction(grocery_run(group, account, subcategory), "alice")
        .await
        .unwrap();

    let err = engine
        .list_transactions(
            TransactionListFilter {
                group_id: Some(group),
                ..Default::default()
            },
            "bob",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine.current_balance(account, "bob").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine.list_group_members(group, "bob").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn members_without_a_capability_are_forbidden() {
    let engine = engine_with_db().await;
    let (group, account, subcategory) = household(&engine).await;
    engine
        .upsert_group_member(
            group,
            "bob",
            Capabilities {
                view_transactions: true,
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();

    // Viewing is allowed.
    let listed = engine
        .list_transactions(
            TransactionListFilter {
                group_id: Some(group),
                ..Default::default()
            },
            "bob",
        )
        .await
        .unwrap();
    assert!(listed.is_empty());

    // Writing is not.
    let err = engine
        .new_transaction(grocery_run(group, account, subcategory), "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn granted_capabilities_take_effect() {
    let engine = engine_with_db().await;
    let (group, account, subcategory) = household(&engine).await;
    engine
        .upsert_group_member(
            group,
            "bob",
            Capabilities {
                add_transactions: true,
                view_transactions: true,
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();

    engine
        .new_transaction(grocery_run(group, account, subcategory), "bob")
        .await
        .unwrap();

    let listed = engine
        .list_transactions(
            TransactionListFilter {
                group_id: Some(group),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user_id, "bob");
}

#[tokio::test]
async fn only_the_owner_manages_members() {
    let engine = engine_with_db().await;
    let (group, _, _) = household(&engine).await;
    engine
        .upsert_group_member(group, "bob", Capabilities::all(), "alice")
        .await
        .unwrap();

    let err = engine
        .upsert_group_member(group, "carol", Capabilities::all(), "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .remove_group_member(group, "bob", "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn the_owner_role_cannot_be_altered() {
    let engine = engine_with_db().await;
    let (group, _, _) = household(&engine).await;

    let err = engine
        .upsert_group_member(group, "alice", Capabilities::default(), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let err = engine
        .remove_group_member(group, "alice", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn removed_members_lose_access() {
    let engine = engine_with_db().await;
    let (group, _, _) = household(&engine).await;
    engine
        .upsert_group_member(group, "bob", Capabilities::all(), "alice")
        .await
        .unwrap();
    engine
        .remove_group_member(group, "bob", "alice")
        .await
        .unwrap();

    let err = engine.list_group_members(group, "bob").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn only_the_owner_deletes_the_group() {
    let engine = engine_with_db().await;
    let (group, _, _) = household(&engine).await;
    engine
        .upsert_group_member(group, "bob", Capabilities::all(), "alice")
        .await
        .unwrap();

    let err = engine.delete_group(group, "bob").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    engine.delete_group(group, "alice").await.unwrap();
    assert!(engine.list_groups("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn member_listing_shows_capability_flags() {
    let engine = engine_with_db().await;
    let (group, _, _) = household(&engine).await;
    let caps = Capabilities {
        manage_budgets: true,
        view_transactions: true,
        ..Default::default()
    };
    engine
        .upsert_group_member(group, "bob", caps, "alice")
        .await
        .unwrap();

    let members = engine.list_group_members(group, "alice").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].0, "bob");
    assert_eq!(members[0].1, caps);
}
