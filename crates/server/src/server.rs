use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{accounts, budgets, categories, groups, transactions};
use engine::{Engine, users};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
}

async fn auth(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user: Option<users::Model> = users::Entity::find()
        .filter(users::Column::Username.eq(auth_header.username()))
        .filter(users::Column::Password.eq(auth_header.password()))
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Builds the full application router with the auth layer applied.
pub fn app(engine: Engine, db: DatabaseConnection) -> Router {
    router(ServerState {
        engine: Arc::new(engine),
        db,
    })
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route(
            "/accounts",
            get(accounts::list).post(accounts::account_new),
        )
        .route(
            "/accounts/{id}",
            get(accounts::get)
                .patch(accounts::update)
                .delete(accounts::remove),
        )
        .route("/accounts/{id}/balance", get(accounts::balance))
        .route(
            "/accounts/{id}/history",
            get(accounts::history).post(accounts::snapshot_new),
        )
        .route("/accounts/{id}/feed", get(accounts::feed))
        .route(
            "/snapshots/{id}",
            patch(accounts::snapshot_update).delete(accounts::snapshot_remove),
        )
        .route(
            "/budgets",
            get(budgets::list).post(budgets::budget_new),
        )
        .route(
            "/budgets/{id}",
            get(budgets::get)
                .patch(budgets::update)
                .delete(budgets::remove),
        )
        .route("/budgets/compare", get(budgets::compare))
        .route(
            "/transactions",
            get(transactions::list).post(transactions::transaction_new),
        )
        .route(
            "/transactions/{id}",
            get(transactions::get)
                .patch(transactions::update)
                .delete(transactions::remove),
        )
        .route("/transactions/aggregate", get(transactions::aggregate))
        .route("/transactions/spending", get(transactions::spending))
        .route(
            "/categories",
            get(categories::list).post(categories::category_new),
        )
        .route(
            "/categories/{id}",
            get(categories::get)
                .patch(categories::update)
                .delete(categories::remove),
        )
        .route("/categories/{id}/hide", post(categories::hide))
        .route("/categories/{id}/unhide", post(categories::unhide))
        .route(
            "/categories/{id}/dependents",
            get(categories::dependents),
        )
        .route(
            "/categories/{id}/subcategories",
            post(categories::subcategory_new),
        )
        .route(
            "/subcategories/{id}",
            get(categories::subcategory_get)
                .patch(categories::subcategory_update)
                .delete(categories::subcategory_remove),
        )
        .route("/subcategories/{id}/hide", post(categories::subcategory_hide))
        .route(
            "/subcategories/{id}/unhide",
            post(categories::subcategory_unhide),
        )
        .route(
            "/subcategories/{id}/dependents",
            get(categories::subcategory_dependents),
        )
        .route("/groups", get(groups::list).post(groups::group_new))
        .route("/groups/{id}", delete(groups::remove))
        .route(
            "/groups/{id}/members",
            get(groups::list_members).post(groups::upsert_member),
        )
        .route(
            "/groups/{id}/members/{username}",
            delete(groups::remove_member),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run(engine: Engine, db: DatabaseConnection) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, db, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(engine, db)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
