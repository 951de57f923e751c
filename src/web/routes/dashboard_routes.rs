use axum::{
    Extension, Json, Router,
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::db::entities::user::UserRole;
use crate::db::services::{sheet_service, user_service};
use crate::web::models::{AddUserForm, CurrentUser, SheetView, UserView};
use crate::web::{AppState, error::AppError};

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/manage_accounts", get(manage_accounts_page))
        .route("/manage_accounts/add_user", post(add_user))
}

/// Role-gated dashboard: developers see the account list alongside their
/// sheets; regular users only see their own sheets.
async fn dashboard_page(
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

    let template = match user.role {
        UserRole::Developer => {
            let users = user_service::list_users(&state.db).await?;
            let users_list: Vec<UserView> = users
                .into_iter()
                .map(|u| UserView {
                    uid: u.uid,
                    email: u.email,
                    role: u.role,
                })
                .collect();
            ctx.insert("users_list", &users_list);
            "admin/dashboard.html"
        }
        UserRole::User => "user_dashboard.html",
    };

    Ok(Html(state.templates.render(template, &ctx)?))
}

async fn manage_accounts_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    if user.role != UserRole::Developer {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let users = user_service::list_users(&state.db).await?;
    let users_list: Vec<UserView> = users
        .into_iter()
        .map(|u| UserView {
            uid: u.uid,
            email: u.email,
            role: u.role,
        })
        .collect();

    let mut ctx = tera::Context::new();
    ctx.insert("user_email", &user.email);
    ctx.insert("users", &users_list);

    Ok(Html(state.templates.render("admin/manage_accounts.html", &ctx)?).into_response())
}

/// Creates the account at the identity provider, then the role record in
/// the store. Developer only.
async fn add_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<AddUserForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    if user.role != UserRole::Developer {
        return Err(AppError::Unauthorized("Unauthorized".to_string()));
    }
    if !matches!(form.role.as_str(), "user" | "developer") {
        return Err(AppError::InvalidInput(format!("Unknown role: {}", form.role)));
    }
    if form.email.trim().is_empty() || form.password.len() < 8 {
        return Err(AppError::InvalidInput(
            "Email is required and the password needs at least 8 characters".to_string(),
        ));
    }
    if user_service::email_exists(&state.db, form.email.trim()).await? {
        return Err(AppError::DuplicateRecord(
            "A user with this email already exists".to_string(),
        ));
    }

    let uid = state
        .identity
        .create_user(form.email.trim(), &form.password)
        .await?;
    user_service::create_user(&state.db, &uid, form.email.trim(), &form.role).await?;

    info!(email = %form.email, role = %form.role, "User account created.");

    Ok(Json(serde_json::json!({ "detail": "User created successfully" })))
}
