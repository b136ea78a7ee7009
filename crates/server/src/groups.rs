//! Group management endpoints (member mutations are owner-only).

use api_types::group::{
    CapabilitiesView, GroupCreated, GroupNew, GroupView, GroupsResponse, MemberUpsert, MemberView,
    MembersResponse,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::{Capabilities, users};

pub async fn group_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupCreated>), ServerError> {
    let id = state.engine.new_group(&payload.name, &user.username).await?;
    Ok((StatusCode::CREATED, Json(GroupCreated { id })))
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<GroupsResponse>, ServerError> {
    let groups = state
        .engine
        .list_groups(&user.username)
        .await?
        .into_iter()
        .map(|g| GroupView {
            id: g.id,
            name: g.name,
            owner: g.owner_user_id,
        })
        .collect();
    Ok(Json(GroupsResponse { groups }))
}

pub async fn remove(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_group(group_id, &user.username).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MembersResponse>, ServerError> {
    let members = state
        .engine
        .list_group_members(group_id, &user.username)
        .await?
        .into_iter()
        .map(|(username, caps)| MemberView {
            username,
            capabilities: capabilities_view(caps),
        })
        .collect();
    Ok(Json(MembersResponse { members }))
}

pub async fn upsert_member(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<MemberUpsert>,
) -> Result<StatusCode, ServerError> {
    let capabilities = Capabilities {
        manage_accounts: payload.capabilities.manage_accounts,
        manage_categories: payload.capabilities.manage_categories,
        manage_budgets: payload.capabilities.manage_budgets,
        add_transactions: payload.capabilities.add_transactions,
        view_transactions: payload.capabilities.view_transactions,
    };
    state
        .engine
        .upsert_group_member(group_id, &payload.username, capabilities, &user.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, username)): Path<(Uuid, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .remove_group_member(group_id, &username, &user.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn capabilities_view(caps: Capabilities) -> CapabilitiesView {
    CapabilitiesView {
        manage_accounts: caps.manage_accounts,
        manage_categories: caps.manage_categories,
        manage_budgets: caps.manage_budgets,
        add_transactions: caps.add_transactions,
        view_transactions: caps.view_transactions,
    }
}
