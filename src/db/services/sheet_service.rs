use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::db::entities::tracked_sheet::{self, HistoryEntry};
use crate::sheets::metadata::SheetMetadata;
use crate::sheets::reconciler::HISTORY_LABEL_ADDED;

/// Creation payload; `url` must already be normalized and the duplicate
/// checks run by the caller.
pub struct NewTrackedSheet {
    pub owner_uid: String,
    pub name: String,
    pub url: String,
    pub added_by: String,
    pub metadata: Option<SheetMetadata>,
    pub status: String,
    pub tabs: Vec<String>,
}

pub async fn list_by_owner(
    db: &DatabaseConnection,
    owner_uid: &str,
) -> Result<Vec<tracked_sheet::Model>, DbErr> {
    tracked_sheet::Entity::find()
        .filter(tracked_sheet::Column::OwnerUid.eq(owner_uid))
        .order_by_asc(tracked_sheet::Column::CreatedAt)
        .all(db)
        .await
}

pub async fn name_exists(
    db: &DatabaseConnection,
    owner_uid: &str,
    name: &str,
) -> Result<bool, DbErr> {
    Ok(tracked_sheet::Entity::find()
        .filter(tracked_sheet::Column::OwnerUid.eq(owner_uid))
        .filter(tracked_sheet::Column::Name.eq(name))
        .one(db)
        .await?
        .is_some())
}

pub async fn url_exists(
    db: &DatabaseConnection,
    owner_uid: &str,
    url: &str,
) -> Result<bool, DbErr> {
    Ok(tracked_sheet::Entity::find()
        .filter(tracked_sheet::Column::OwnerUid.eq(owner_uid))
        .filter(tracked_sheet::Column::Url.eq(url))
        .one(db)
        .await?
        .is_some())
}

/// The "added" snapshot opening a record's history log; present only when
/// metadata was obtainable at creation time.
fn initial_history(
    metadata: Option<&SheetMetadata>,
    now: chrono::DateTime<Utc>,
) -> Vec<HistoryEntry> {
    match metadata {
        Some(meta) => vec![HistoryEntry {
            timestamp: now.to_rfc3339(),
            last_modified: meta.modified_time.clone(),
            last_modified_by: meta.last_user.clone(),
            last_modified_email: meta.last_user_email.clone(),
            status: HISTORY_LABEL_ADDED.to_string(),
        }],
        None => Vec::new(),
    }
}

/// Inserts a new record. When metadata was obtainable at creation time the
/// history log starts with its "added" snapshot; otherwise it starts empty.
pub async fn create_sheet(
    db: &DatabaseConnection,
    new: NewTrackedSheet,
) -> Result<tracked_sheet::Model, DbErr> {
    let now = Utc::now();
    let history = initial_history(new.metadata.as_ref(), now);

    let model = tracked_sheet::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_uid: Set(new.owner_uid),
        name: Set(new.name),
        url: Set(new.url),
        added_by: Set(new.added_by),
        created_at: Set(now),
        last_modified: Set(new.metadata.as_ref().and_then(|m| m.modified_time.clone())),
        last_modified_by: Set(new.metadata.as_ref().and_then(|m| m.last_user.clone())),
        last_modified_email: Set(new.metadata.as_ref().and_then(|m| m.last_user_email.clone())),
        status: Set(new.status),
        tabs: Set(serde_json::json!(new.tabs)),
        history: Set(serde_json::json!(history)),
        last_checked: Set(None),
    };
    model.insert(db).await
}

/// Persists the post-merge state produced by the reconciler. Only the
/// mutable columns are written; identity and creation fields stay put.
pub async fn apply_reconciliation(
    db: &DatabaseConnection,
    updated: tracked_sheet::Model,
) -> Result<tracked_sheet::Model, DbErr> {
    let model = tracked_sheet::ActiveModel {
        id: Unchanged(updated.id),
        last_modified: Set(updated.last_modified.clone()),
        last_modified_by: Set(updated.last_modified_by.clone()),
        last_modified_email: Set(updated.last_modified_email.clone()),
        status: Set(updated.status.clone()),
        tabs: Set(updated.tabs.clone()),
        history: Set(updated.history.clone()),
        last_checked: Set(updated.last_checked),
        ..Default::default()
    };
    model.update(db).await
}
