use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::entities::tracked_sheet;
use crate::db::entities::user::UserRole;

/// Resolved identity of the request, passed as a request extension by the
/// auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub uid: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "idToken")]
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct AddSheetForm {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct AddUserForm {
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Row shape shared by the HTML tables and the check_updates response.
#[derive(Debug, Clone, Serialize)]
pub struct SheetView {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub modified_by: String,
    pub modified_email: String,
    pub last_modified_dt: Option<String>,
    pub status: String,
    pub tabs: Vec<String>,
}

impl From<&tracked_sheet::Model> for SheetView {
    fn from(model: &tracked_sheet::Model) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            url: model.url.clone(),
            modified_by: model
                .last_modified_by
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            modified_email: model
                .last_modified_email
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            last_modified_dt: model.last_modified.clone(),
            status: model.status.clone(),
            tabs: model.tab_titles(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckUpdatesResponse {
    pub updated_sheets: Vec<SheetView>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub uid: String,
    pub email: String,
    pub role: String,
}
