use axum::{
    Json, Router,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::services::user_service;
use crate::web::middleware::auth::SESSION_COOKIE;
use crate::web::models::LoginRequest;
use crate::web::{AppState, error::AppError};

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

fn session_cookie(value: String, max_age_days: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .max_age(time::Duration::days(max_age_days))
        .build()
}

async fn login_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response, AppError> {
    // An already-valid session skips the login form.
    if let Some(token) = jar.get(SESSION_COOKIE) {
        if state.identity.verify_session(token.value()).await.is_ok() {
            return Ok(Redirect::to("/dashboard").into_response());
        }
    }

    let html = state
        .templates
        .render("login.html", &tera::Context::new())?;
    Ok(Html(html).into_response())
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if payload.id_token.is_empty() {
        warn!("Login attempt without ID token");
        return Err(AppError::InvalidInput("ID token required".to_string()));
    }

    let ttl = Duration::days(state.config.session_ttl_days);
    let cookie_value = state.identity.create_session(&payload.id_token, ttl).await?;
    let session = state.identity.verify_session(&cookie_value).await?;

    let user = user_service::get_user_by_uid(&state.db, &session.uid)
        .await?
        .ok_or_else(|| {
            warn!(email = %session.email, "Unregistered user login attempt");
            AppError::Unauthorized("User not registered".to_string())
        })?;

    info!(email = %session.email, "Login successful");

    let body = Json(serde_json::json!({
        "detail": "Login successful",
        "user": { "uid": user.uid, "email": user.email, "role": user.role },
    }));
    let cookie = session_cookie(cookie_value, state.config.session_ttl_days);

    let mut response = body.into_response();
    response.headers_mut().insert(
        axum::http::header::SET_COOKIE,
        cookie.to_string().parse().unwrap(),
    );
    Ok(response)
}

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    info!("Logout requested");

    // Best-effort server-side revocation; the cookie is cleared regardless.
    if let Some(token) = jar.get(SESSION_COOKIE) {
        if let Ok(session) = state.identity.verify_session(token.value()).await {
            if let Err(e) = state.identity.revoke_sessions(&session.uid).await {
                warn!(error = %e, "Failed to revoke sessions during logout.");
            }
        }
    }

    let removal = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();

    let mut response = Redirect::to("/auth/login").into_response();
    response.headers_mut().insert(
        axum::http::header::SET_COOKIE,
        removal.to_string().parse().unwrap(),
    );
    response
}
