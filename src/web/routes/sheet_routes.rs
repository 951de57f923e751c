use axum::{
    Extension, Json, Router,
    extract::{Form, State},
    response::Html,
    routing::{get, post},
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

use crate::db::services::sheet_service::{self, NewTrackedSheet};
use crate::sheets::fetcher::normalize_url;
use crate::sheets::reconciler;
use crate::web::models::{AddSheetForm, CheckUpdatesResponse, CurrentUser, SheetView};
use crate::web::{AppState, error::AppError};

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/online_sheets", get(online_sheets_page))
        .route("/online_sheets/add", post(add_sheet))
        .route("/online_sheets/check_updates", get(check_updates))
}

async fn online_sheets_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    let sheets = sheet_service::list_by_owner(&state.db, &user.uid).await?;
    let views: Vec<SheetView> = sheets.iter().map(SheetView::from).collect();

    let mut ctx = tera::Context::new();
    ctx.insert("user_email", &user.email);
    ctx.insert("user_role", user.role.as_str());
    ctx.insert("sheets", &views);
    ctx.insert("now", &Utc::now().to_rfc3339());

    Ok(Html(state.templates.render("online_sheets.html", &ctx)?))
}

async fn add_sheet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<AddSheetForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    if form.name.trim().is_empty() || form.url.trim().is_empty() {
        return Err(AppError::InvalidInput("Name and URL are required".to_string()));
    }

    let normalized_url = normalize_url(form.url.trim());
    let name = form.name.trim().to_string();

    ensure_not_duplicate(&state.db, &user.uid, &name, &normalized_url).await?;

    let probe = state.fetcher.probe(&normalized_url).await;
    let tabs = probe.tabs.clone();

    let sheet = sheet_service::create_sheet(
        &state.db,
        NewTrackedSheet {
            owner_uid: user.uid.clone(),
            name,
            url: normalized_url,
            added_by: user.email.clone(),
            metadata: probe.metadata.fetched().cloned(),
            status: probe.status.as_str().to_string(),
            tabs: probe.tabs,
        },
    )
    .await?;

    info!(sheet_id = %sheet.id, owner = %user.uid, "Sheet added.");

    Ok(Json(serde_json::json!({
        "detail": "Sheet added successfully",
        "tabs": tabs,
    })))
}

/// Per-owner uniqueness of both the display name and the normalized URL,
/// checked before anything is written.
async fn ensure_not_duplicate(
    db: &DatabaseConnection,
    owner_uid: &str,
    name: &str,
    url: &str,
) -> Result<(), AppError> {
    if sheet_service::name_exists(db, owner_uid, name).await? {
        return Err(AppError::DuplicateRecord(
            "Sheet with this name already exists".to_string(),
        ));
    }
    if sheet_service::url_exists(db, owner_uid, url).await? {
        return Err(AppError::DuplicateRecord(
            "Sheet with this URL already exists".to_string(),
        ));
    }
    Ok(())
}

async fn check_updates(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<CheckUpdatesResponse>, AppError> {
    let sheets = sheet_service::list_by_owner(&state.db, &user.uid).await?;
    let updated = reconciler::reconcile_all(&state.db, &state.fetcher, sheets).await;

    Ok(Json(CheckUpdatesResponse {
        updated_sheets: updated.iter().map(SheetView::from).collect(),
        checked_at: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::tracked_sheet;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use uuid::Uuid;

    fn existing_sheet(name: &str, url: &str) -> tracked_sheet::Model {
        tracked_sheet::Model {
            id: Uuid::new_v4(),
            owner_uid: "uid-1".to_string(),
            name: name.to_string(),
            url: url.to_string(),
            added_by: "owner@example.com".to_string(),
            created_at: Utc::now(),
            last_modified: None,
            last_modified_by: None,
            last_modified_email: None,
            status: "unknown".to_string(),
            tabs: serde_json::json!([]),
            history: serde_json::json!([]),
            last_checked: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected_before_any_write() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing_sheet(
                "Roster",
                "https://docs.google.com/spreadsheets/d/abc",
            )]])
            .into_connection();

        let err = ensure_not_duplicate(
            &db,
            "uid-1",
            "Roster",
            "https://docs.google.com/spreadsheets/d/other",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::DuplicateRecord(msg) if msg.contains("name")));

        // The name hit short-circuits after a single select.
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected_before_any_write() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                Vec::<tracked_sheet::Model>::new(),
                vec![existing_sheet(
                    "Roster",
                    "https://docs.google.com/spreadsheets/d/abc",
                )],
            ])
            .into_connection();

        let err = ensure_not_duplicate(
            &db,
            "uid-1",
            "Budget",
            "https://docs.google.com/spreadsheets/d/abc",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::DuplicateRecord(msg) if msg.contains("URL")));

        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_unique_name_and_url_pass_both_checks() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                Vec::<tracked_sheet::Model>::new(),
                Vec::<tracked_sheet::Model>::new(),
            ])
            .into_connection();

        ensure_not_duplicate(
            &db,
            "uid-1",
            "Budget",
            "https://docs.google.com/spreadsheets/d/xyz",
        )
        .await
        .unwrap();

        // Exactly the two selects, no insert.
        assert_eq!(db.into_transaction_log().len(), 2);
    }
}
