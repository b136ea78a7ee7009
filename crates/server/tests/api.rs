use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine as _;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, Database, Statement};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use api_types::account::{AccountCreated, BalanceView};
use api_types::budget::ComparisonView;
use api_types::transaction::TransactionsResponse;
use migration::MigratorTrait;

async fn app() -> Router {
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
    let engine = engine::Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    server::app(engine, db)
}

fn request(method: &str, uri: &str, credentials: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(credentials) = credentials {
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        builder = builder.header(header::AUTHORIZATION, format!("Basic {encoded}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_account(app: &Router, name: &str) -> Uuid {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/accounts",
            Some("alice:password"),
            Some(json!({
                "name": name,
                "kind": "cash",
                "group_id": null,
                "subcategory_id": null,
                "debit_method": null,
                "budget_month_basis": null,
                "credit_closing_day": null,
                "credit_due_day": null,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: AccountCreated = json_body(response).await;
    created.id
}

#[tokio::test]
async fn requests_without_credentials_are_rejected() {
    let app = app().await;
    let response = app
        .oneshot(request("GET", "/accounts", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = app().await;
    let response = app
        .oneshot(request("GET", "/accounts", Some("alice:nope"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn balance_reflects_snapshot_and_ledger() {
    let app = app().await;
    let account = create_account(&app, "Wallet").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/accounts/{account}/history"),
            Some("alice:password"),
            Some(json!({ "amount": "100", "date": "2024-03-01T12:00:00Z" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/transactions",
            Some("alice:password"),
            Some(json!({
                "title": "salary",
                "amount": "20",
                "kind": "income",
                "account_id": account,
                "to_account_id": null,
                "subcategory_id": null,
                "description": null,
                "occurred_at": "2024-03-02T12:00:00Z",
                "group_id": null,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/accounts/{account}/balance"),
            Some("alice:password"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let balance: BalanceView = json_body(response).await;
    assert_eq!(balance.amount, dec!(120));
}

#[tokio::test]
async fn unknown_account_is_not_found() {
    let app = app().await;
    let response = app
        .oneshot(request(
            "GET",
            &format!("/accounts/{}/balance", Uuid::new_v4()),
            Some("alice:password"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn credit_fields_on_a_cash_account_are_unprocessable() {
    let app = app().await;
    let response = app
        .oneshot(request(
            "POST",
            "/accounts",
            Some("alice:password"),
            Some(json!({
                "name": "Wallet",
                "kind": "cash",
                "group_id": null,
                "subcategory_id": null,
                "debit_method": "invoice",
                "budget_month_basis": null,
                "credit_closing_day": null,
                "credit_due_day": null,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn transfers_need_a_destination() {
    let app = app().await;
    let account = create_account(&app, "Wallet").await;
    let response = app
        .oneshot(request(
            "POST",
            "/transactions",
            Some("alice:password"),
            Some(json!({
                "title": "move",
                "amount": "10",
                "kind": "transfer",
                "account_id": account,
                "to_account_id": null,
                "subcategory_id": null,
                "description": null,
                "occurred_at": "2024-03-02T12:00:00Z",
                "group_id": null,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn transaction_listing_respects_filters() {
    let app = app().await;
    let account = create_account(&app, "Wallet").await;
    for (title, occurred_at) in [
        ("march", "2024-03-02T12:00:00Z"),
        ("april", "2024-04-02T12:00:00Z"),
    ] {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/transactions",
                Some("alice:password"),
                Some(json!({
                    "title": title,
                    "amount": "5",
                    "kind": "expense",
                    "account_id": account,
                    "to_account_id": null,
                    "subcategory_id": null,
                    "description": null,
                    "occurred_at": occurred_at,
                    "group_id": null,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(request(
            "GET",
            "/transactions?from=2024-03-01T00:00:00Z&to=2024-04-01T00:00:00Z",
            Some("alice:password"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed: TransactionsResponse = json_body(response).await;
    assert_eq!(listed.transactions.len(), 1);
    assert_eq!(listed.transactions[0].title, "march");
}

#[tokio::test]
async fn comparison_endpoint_reports_the_difference() {
    let app = app().await;
    let account = create_account(&app, "Wallet").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/categories",
            Some("alice:password"),
            Some(json!({ "name": "Food", "kind": "expense", "group_id": null })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let category: api_types::category::Created = json_body(response).await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/categories/{}/subcategories", category.id),
            Some("alice:password"),
            Some(json!({ "name": "Groceries" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let subcategory: api_types::category::Created = json_body(response).await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/budgets",
            Some("alice:password"),
            Some(json!({
                "subcategory_id": subcategory.id,
                "year": 2024,
                "month": 3,
                "amount": "300",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/transactions",
            Some("alice:password"),
            Some(json!({
                "title": "groceries",
                "amount": "120",
                "kind": "expense",
                "account_id": account,
                "to_account_id": null,
                "subcategory_id": subcategory.id,
                "description": null,
                "occurred_at": "2024-03-10T12:00:00Z",
                "group_id": null,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/budgets/compare?year=2024&month=3&subcategory_id={}", subcategory.id),
            Some("alice:password"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let comparison: ComparisonView = json_body(response).await;
    assert_eq!(comparison.budgeted, dec!(300));
    assert_eq!(comparison.actual, dec!(120));
    assert_eq!(comparison.difference, dec!(180));
}
