//! Budgets API endpoints. Every write re-synchronizes the annual budget
//! inside the engine's own transaction.

use api_types::budget::{
    BudgetCreated, BudgetNew, BudgetUpdate, BudgetView, BudgetsResponse, CompareQuery,
    ComparisonView, ListQuery,
};
use api_types::category::CategoryKind;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::users;

pub async fn budget_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<BudgetNew>,
) -> Result<(StatusCode, Json<BudgetCreated>), ServerError> {
    let cmd = engine::NewBudget {
        subcategory_id: payload.subcategory_id,
        year: payload.year,
        month: payload.month,
        amount: payload.amount,
    };
    let id = state.engine.new_budget(cmd, &user.username).await?;
    Ok((StatusCode::CREATED, Json(BudgetCreated { id })))
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<BudgetsResponse>, ServerError> {
    let filter = engine::BudgetFilter {
        year: query.year,
        month: query.month,
        subcategory_id: query.subcategory_id,
        kind: query
            .kind
            .map(|k| engine::CategoryKind::try_from(k.as_str()))
            .transpose()?,
    };
    let budgets = state
        .engine
        .list_budgets(filter, &user.username)
        .await?
        .into_iter()
        .map(budget_view)
        .collect::<Result<_, _>>()?;
    Ok(Json(BudgetsResponse { budgets }))
}

pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
) -> Result<Json<BudgetView>, ServerError> {
    let model = state.engine.budget(budget_id, &user.username).await?;
    Ok(Json(budget_view(model)?))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<BudgetUpdate>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .update_budget(budget_id, payload.amount, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn remove(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_budget(budget_id, &user.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn compare(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<ComparisonView>, ServerError> {
    let comparison = state
        .engine
        .compare_budget(
            query.year,
            query.month,
            query.subcategory_id,
            query
                .kind
                .map(|k| engine::CategoryKind::try_from(k.as_str()))
                .transpose()?,
            &user.username,
        )
        .await?;
    Ok(Json(ComparisonView {
        budgeted: comparison.budgeted,
        actual: comparison.actual,
        difference: comparison.difference,
    }))
}

fn budget_view(model: engine::budgets::Model) -> Result<BudgetView, ServerError> {
    let kind = match engine::CategoryKind::try_from(model.kind.as_str())? {
        engine::CategoryKind::Expense => CategoryKind::Expense,
        engine::CategoryKind::Income => CategoryKind::Income,
    };
    Ok(BudgetView {
        id: model.id,
        subcategory_id: model.subcategory_id,
        year: model.year,
        month: model.month,
        amount: model.amount,
        kind,
    })
}
