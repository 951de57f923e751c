use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Identity-provider uid; assigned externally, never generated here.
    #[sea_orm(primary_key, auto_increment = false)]
    pub uid: String,
    #[sea_orm(unique)]
    pub email: String,
    pub role: String,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tracked_sheet::Entity")]
    TrackedSheets,
}

impl Related<super::tracked_sheet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackedSheets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Role values stored in `users.role`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UserRole {
    User,
    Developer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Developer => "developer",
        }
    }

    /// Unknown values fall back to the least-privileged role.
    pub fn from_str(s: &str) -> Self {
        match s {
            "developer" => UserRole::Developer,
            _ => UserRole::User,
        }
    }
}

impl Model {
    pub fn role(&self) -> UserRole {
        UserRole::from_str(&self.role)
    }
}
