//! Ownership scope of a record.
//!
//! Every account, category and transaction is owned either by a single user
//! or by a group, never both. Queries never test the two columns ad hoc;
//! they build their filter from this union so the exclusivity invariant
//! holds everywhere.

use sea_orm::{ColumnTrait, Condition};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Personal { user_id: String },
    Group { group_id: Uuid },
}

impl Scope {
    pub fn personal(user_id: &str) -> Self {
        Self::Personal {
            user_id: user_id.to_string(),
        }
    }

    pub fn group(group_id: Uuid) -> Self {
        Self::Group { group_id }
    }

    /// Scope for a caller-supplied optional group id.
    pub fn for_caller(user_id: &str, group_id: Option<Uuid>) -> Self {
        match group_id {
            Some(group_id) => Self::Group { group_id },
            None => Self::personal(user_id),
        }
    }

    /// Builds the query condition over an entity's `(user_id, group_id)`
    /// column pair.
    pub fn condition<C: ColumnTrait>(&self, user_col: C, group_col: C) -> Condition {
        match self {
            Self::Personal { user_id } => Condition::all()
                .add(user_col.eq(user_id.clone()))
                .add(group_col.is_null()),
            Self::Group { group_id } => Condition::all().add(group_col.eq(*group_id)),
        }
    }

    /// The `(user_id, group_id)` column values a new row must carry.
    pub fn columns(&self) -> (Option<String>, Option<Uuid>) {
        match self {
            Self::Personal { user_id } => (Some(user_id.clone()), None),
            Self::Group { group_id } => (None, Some(*group_id)),
        }
    }

    pub fn group_id(&self) -> Option<Uuid> {
        match self {
            Self::Personal { .. } => None,
            Self::Group { group_id } => Some(*group_id),
        }
    }
}
