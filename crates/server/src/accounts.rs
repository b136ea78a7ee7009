//! Accounts API endpoints: CRUD, derived balance, snapshot history, feed.

use api_types::account::{
    AccountCreated, AccountKind, AccountNew, AccountUpdate, AccountView, AccountsResponse,
    BalanceView, BudgetMonthBasis, DebitMethod, FeedEntryView, FeedResponse, HistoryResponse,
    ListQuery, SnapshotCreated, SnapshotNew, SnapshotView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, transactions::transaction_view};
use engine::users;

pub async fn account_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountCreated>), ServerError> {
    let cmd = engine::NewAccount {
        name: payload.name,
        kind: engine::AccountKind::try_from(payload.kind.as_str())?,
        group_id: payload.group_id,
        subcategory_id: payload.subcategory_id,
        debit_method: payload
            .debit_method
            .map(|m| engine::DebitMethod::try_from(m.as_str()))
            .transpose()?,
        budget_month_basis: payload
            .budget_month_basis
            .map(|b| engine::BudgetMonthBasis::try_from(b.as_str()))
            .transpose()?,
        credit_closing_day: payload.credit_closing_day,
        credit_due_day: payload.credit_due_day,
    };
    let id = state.engine.new_account(cmd, &user.username).await?;
    Ok((StatusCode::CREATED, Json(AccountCreated { id })))
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<AccountsResponse>, ServerError> {
    let accounts = state
        .engine
        .list_accounts(query.group_id, &user.username)
        .await?
        .into_iter()
        .map(account_view)
        .collect::<Result<_, _>>()?;
    Ok(Json(AccountsResponse { accounts }))
}

pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountView>, ServerError> {
    let model = state.engine.account(account_id, &user.username).await?;
    Ok(Json(account_view(model)?))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<AccountUpdate>,
) -> Result<StatusCode, ServerError> {
    let cmd = engine::UpdateAccount {
        name: payload.name,
        subcategory_id: payload.subcategory_id,
        debit_method: payload
            .debit_method
            .map(|m| {
                m.map(|m| engine::DebitMethod::try_from(m.as_str()))
                    .transpose()
            })
            .transpose()?,
        budget_month_basis: payload
            .budget_month_basis
            .map(|b| {
                b.map(|b| engine::BudgetMonthBasis::try_from(b.as_str()))
                    .transpose()
            })
            .transpose()?,
        credit_closing_day: payload.credit_closing_day,
        credit_due_day: payload.credit_due_day,
    };
    state
        .engine
        .update_account(account_id, cmd, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn remove(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_account(account_id, &user.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn balance(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<BalanceView>, ServerError> {
    let view = state
        .engine
        .current_balance(account_id, &user.username)
        .await?;
    Ok(Json(BalanceView {
        amount: view.amount,
        as_of: view.as_of,
    }))
}

pub async fn history(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let snapshots = state
        .engine
        .balance_history(account_id, &user.username)
        .await?
        .into_iter()
        .map(snapshot_view)
        .collect();
    Ok(Json(HistoryResponse { snapshots }))
}

pub async fn feed(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<FeedResponse>, ServerError> {
    let entries = state
        .engine
        .account_feed(account_id, &user.username)
        .await?
        .into_iter()
        .map(|entry| match entry {
            engine::FeedEntry::Transaction(tx) => {
                Ok(FeedEntryView::Transaction(transaction_view(tx)?))
            }
            engine::FeedEntry::Snapshot(snapshot) => {
                Ok(FeedEntryView::Snapshot(snapshot_view(snapshot)))
            }
        })
        .collect::<Result<_, ServerError>>()?;
    Ok(Json(FeedResponse { entries }))
}

pub async fn snapshot_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<SnapshotNew>,
) -> Result<(StatusCode, Json<SnapshotCreated>), ServerError> {
    let id = state
        .engine
        .add_balance_snapshot(account_id, payload.amount, payload.date, &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(SnapshotCreated { id })))
}

pub async fn snapshot_update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(snapshot_id): Path<Uuid>,
    Json(payload): Json<SnapshotNew>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .update_balance_snapshot(snapshot_id, payload.amount, payload.date, &user.username)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn snapshot_remove(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(snapshot_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_balance_snapshot(snapshot_id, &user.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn snapshot_view(model: engine::account_balances::Model) -> SnapshotView {
    SnapshotView {
        id: model.id,
        amount: model.amount,
        date: model.date,
        created_at: model.created_at,
    }
}

fn account_view(model: engine::accounts::Model) -> Result<AccountView, ServerError> {
    let kind = match engine::AccountKind::try_from(model.kind.as_str())? {
        engine::AccountKind::Credit => AccountKind::Credit,
        engine::AccountKind::Cash => AccountKind::Cash,
        engine::AccountKind::Prepaid => AccountKind::Prepaid,
    };
    let debit_method = model
        .debit_method
        .as_deref()
        .map(engine::DebitMethod::try_from)
        .transpose()?
        .map(|m| match m {
            engine::DebitMethod::PerPurchase => DebitMethod::PerPurchase,
            engine::DebitMethod::Invoice => DebitMethod::Invoice,
        });
    let budget_month_basis = model
        .budget_month_basis
        .as_deref()
        .map(engine::BudgetMonthBasis::try_from)
        .transpose()?
        .map(|b| match b {
            engine::BudgetMonthBasis::TransactionDate => BudgetMonthBasis::TransactionDate,
            engine::BudgetMonthBasis::DueDate => BudgetMonthBasis::DueDate,
        });

    Ok(AccountView {
        id: model.id,
        name: model.name,
        kind,
        group_id: model.group_id,
        subcategory_id: model.subcategory_id,
        debit_method,
        budget_month_basis,
        credit_closing_day: model.credit_closing_day,
        credit_due_day: model.credit_due_day,
    })
}
