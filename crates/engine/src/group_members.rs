//! Group membership rows with per-member capability flags.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "group_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub can_manage_accounts: bool,
    pub can_manage_categories: bool,
    pub can_manage_budgets: bool,
    pub can_add_transactions: bool,
    pub can_view_transactions: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Group,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Capabilities a caller holds inside a group.
///
/// The group owner is not stored as a member row; [`Capabilities::all`] is
/// synthesized for them during access checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub manage_accounts: bool,
    pub manage_categories: bool,
    pub manage_budgets: bool,
    pub add_transactions: bool,
    pub view_transactions: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            manage_accounts: true,
            manage_categories: true,
            manage_budgets: true,
            add_transactions: true,
            view_transactions: true,
        }
    }
}

impl From<&Model> for Capabilities {
    fn from(model: &Model) -> Self {
        Self {
            manage_accounts: model.can_manage_accounts,
            manage_categories: model.can_manage_categories,
            manage_budgets: model.can_manage_budgets,
            add_transactions: model.can_add_transactions,
            view_transactions: model.can_view_transactions,
        }
    }
}
