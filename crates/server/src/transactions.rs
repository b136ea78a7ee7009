//! Transactions API endpoints: ledger CRUD and aggregation.

use api_types::transaction::{
    AggregateBucketView, AggregateQuery, AggregateResponse, ListQuery, SpendingRangeQuery,
    SpendingRangeResponse, SpendingTotalView, TransactionCreated, TransactionKind, TransactionNew,
    TransactionUpdate, TransactionView, TransactionsResponse,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::users;

pub async fn transaction_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let cmd = engine::NewTransaction {
        title: payload.title,
        amount: payload.amount,
        kind: engine::TransactionKind::try_from(payload.kind.as_str())?,
        account_id: payload.account_id,
        to_account_id: payload.to_account_id,
        subcategory_id: payload.subcategory_id,
        description: payload.description,
        occurred_at: payload.occurred_at,
        group_id: payload.group_id,
    };
    let id = state.engine.new_transaction(cmd, &user.username).await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { id })))
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<TransactionsResponse>, ServerError> {
    let filter = engine::TransactionListFilter {
        group_id: query.group_id,
        account_id: query.account_id,
        subcategory_id: query.subcategory_id,
        kind: query
            .kind
            .map(|k| engine::TransactionKind::try_from(k.as_str()))
            .transpose()?,
        from: query.from,
        to: query.to,
    };
    let transactions = state
        .engine
        .list_transactions(filter, &user.username)
        .await?
        .into_iter()
        .map(transaction_view)
        .collect::<Result<_, _>>()?;
    Ok(Json(TransactionsResponse { transactions }))
}

pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionView>, ServerError> {
    let model = state
        .engine
        .transaction(transaction_id, &user.username)
        .await?;
    Ok(Json(transaction_view(model)?))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
    Json(payload): Json<TransactionUpdate>,
) -> Result<StatusCode, ServerError> {
    let cmd = engine::UpdateTransaction {
        title: payload.title,
        amount: payload.amount,
        kind: payload
            .kind
            .map(|k| engine::TransactionKind::try_from(k.as_str()))
            .transpose()?,
        account_id: payload.account_id,
        to_account_id: payload.to_account_id,
        subcategory_id: payload.subcategory_id,
        description: payload.description,
        occurred_at: payload.occurred_at,
    };
    state
        .engine
        .update_transaction(transaction_id, cmd, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn remove(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_transaction(transaction_id, &user.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn aggregate(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Query(query): Query<AggregateQuery>,
) -> Result<Json<AggregateResponse>, ServerError> {
    let buckets = state
        .engine
        .aggregate_by_year(query.year, query.group_id, &user.username)
        .await?
        .into_iter()
        .map(|bucket| {
            Ok(AggregateBucketView {
                subcategory_id: bucket.subcategory_id,
                month: bucket.month,
                year: bucket.year,
                kind: kind_view(bucket.kind),
                total: bucket.total,
                count: bucket.count,
            })
        })
        .collect::<Result<_, ServerError>>()?;
    Ok(Json(AggregateResponse { buckets }))
}

pub async fn spending(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Query(query): Query<SpendingRangeQuery>,
) -> Result<Json<SpendingRangeResponse>, ServerError> {
    let totals = state
        .engine
        .spending_by_range(query.from, query.to, query.group_id, &user.username)
        .await?
        .into_iter()
        .map(|total| SpendingTotalView {
            subcategory_id: total.subcategory_id,
            kind: kind_view(total.kind),
            total: total.total,
            count: total.count,
        })
        .collect();
    Ok(Json(SpendingRangeResponse { totals }))
}

fn kind_view(kind: engine::TransactionKind) -> TransactionKind {
    match kind {
        engine::TransactionKind::Expense => TransactionKind::Expense,
        engine::TransactionKind::Income => TransactionKind::Income,
        engine::TransactionKind::Transfer => TransactionKind::Transfer,
    }
}

pub(crate) fn transaction_view(
    model: engine::transactions::Model,
) -> Result<TransactionView, ServerError> {
    let kind = kind_view(engine::TransactionKind::try_from(model.kind.as_str())?);
    Ok(TransactionView {
        id: model.id,
        title: model.title,
        amount: model.amount,
        kind,
        account_id: model.account_id,
        to_account_id: model.to_account_id,
        subcategory_id: model.subcategory_id,
        description: model.description,
        occurred_at: model.occurred_at,
        group_id: model.group_id,
    })
}
