use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracked_sheets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_uid: String,
    pub name: String,
    /// Normalized at creation: trailing slashes stripped.
    pub url: String,
    pub added_by: String,
    pub created_at: ChronoDateTimeUtc,
    /// ISO-8601 string as reported by the provider; None until the first
    /// successful metadata fetch.
    pub last_modified: Option<String>,
    pub last_modified_by: Option<String>,
    pub last_modified_email: Option<String>,
    /// "reachable" | "unreachable" | "unknown"; last probe result.
    pub status: String,
    /// Ordered tab titles as of the last successful fetch.
    #[sea_orm(column_type = "JsonBinary")]
    pub tabs: Json,
    /// Append-only array of HistoryEntry snapshots, chronological.
    #[sea_orm(column_type = "JsonBinary")]
    pub history: Json,
    pub last_checked: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerUid",
        to = "super::user::Column::Uid",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// One immutable snapshot in a sheet's history log. The first entry of a
/// record carries status "added"; every later one carries "updated".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub last_modified: Option<String>,
    pub last_modified_by: Option<String>,
    pub last_modified_email: Option<String>,
    pub status: String,
}

impl Model {
    pub fn tab_titles(&self) -> Vec<String> {
        serde_json::from_value(self.tabs.clone()).unwrap_or_default()
    }

    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        serde_json::from_value(self.history.clone()).unwrap_or_default()
    }
}
