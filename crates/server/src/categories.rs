//! Categories and subcategories API endpoints, including the hide/unhide
//! cascade and dependent-aware deletes.

use api_types::category::{
    CategoriesResponse, CategoryKind, CategoryNew, CategoryUpdate, CategoryView, Created,
    DeleteMode, DeleteRequest, DependentsView, ListQuery, SubcategoryNew, SubcategoryView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::users;

pub async fn category_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<CategoryNew>,
) -> Result<(StatusCode, Json<Created>), ServerError> {
    let kind = engine::CategoryKind::try_from(payload.kind.as_str())?;
    let id = state
        .engine
        .new_category(&payload.name, kind, payload.group_id, &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<CategoriesResponse>, ServerError> {
    let categories = state
        .engine
        .list_categories(
            query.group_id,
            query.include_hidden.unwrap_or(false),
            &user.username,
        )
        .await?
        .into_iter()
        .map(|(category, subs)| category_view(category, subs))
        .collect::<Result<_, _>>()?;
    Ok(Json(CategoriesResponse { categories }))
}

pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
) -> Result<Json<CategoryView>, ServerError> {
    let (category, subs) = state.engine.category(category_id, &user.username).await?;
    Ok(Json(category_view(category, subs)?))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .update_category(category_id, &payload.name, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn hide(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .set_category_hidden(category_id, true, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn unhide(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .set_category_hidden(category_id, false, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn dependents(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
) -> Result<Json<DependentsView>, ServerError> {
    let counts = state
        .engine
        .category_dependents(category_id, &user.username)
        .await?;
    Ok(Json(dependents_view(counts)))
}

pub async fn remove(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<DeleteRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_category(category_id, delete_mode(payload.mode), &user.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn subcategory_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<SubcategoryNew>,
) -> Result<(StatusCode, Json<Created>), ServerError> {
    let id = state
        .engine
        .new_subcategory(category_id, &payload.name, &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn subcategory_get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(subcategory_id): Path<Uuid>,
) -> Result<Json<SubcategoryView>, ServerError> {
    let sub = state
        .engine
        .subcategory(subcategory_id, &user.username)
        .await?;
    Ok(Json(SubcategoryView {
        id: sub.id,
        name: sub.name,
        hidden: sub.hidden,
    }))
}

pub async fn subcategory_update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(subcategory_id): Path<Uuid>,
    Json(payload): Json<SubcategoryNew>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .update_subcategory(subcategory_id, &payload.name, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn subcategory_hide(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(subcategory_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .set_subcategory_hidden(subcategory_id, true, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn subcategory_unhide(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(subcategory_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .set_subcategory_hidden(subcategory_id, false, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn subcategory_dependents(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(subcategory_id): Path<Uuid>,
) -> Result<Json<DependentsView>, ServerError> {
    let counts = state
        .engine
        .subcategory_dependents(subcategory_id, &user.username)
        .await?;
    Ok(Json(dependents_view(counts)))
}

pub async fn subcategory_remove(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(subcategory_id): Path<Uuid>,
    Json(payload): Json<DeleteRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_subcategory(subcategory_id, delete_mode(payload.mode), &user.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn delete_mode(mode: Option<DeleteMode>) -> Option<engine::DeleteMode> {
    mode.map(|mode| match mode {
        DeleteMode::Cascade => engine::DeleteMode::Cascade,
        DeleteMode::MoveTo { subcategory_id } => engine::DeleteMode::MoveTo(subcategory_id),
    })
}

fn dependents_view(counts: engine::DependentCounts) -> DependentsView {
    DependentsView {
        transactions: counts.transactions,
        budgets: counts.budgets,
        accounts: counts.accounts,
    }
}

fn category_view(
    category: engine::categories::Model,
    subs: Vec<engine::subcategories::Model>,
) -> Result<CategoryView, ServerError> {
    let kind = match engine::CategoryKind::try_from(category.kind.as_str())? {
        engine::CategoryKind::Expense => CategoryKind::Expense,
        engine::CategoryKind::Income => CategoryKind::Income,
    };
    Ok(CategoryView {
        id: category.id,
        name: category.name,
        kind,
        hidden: category.hidden,
        subcategories: subs
            .into_iter()
            .map(|s| SubcategoryView {
                id: s.id,
                name: s.name,
                hidden: s.hidden,
            })
            .collect(),
    })
}
