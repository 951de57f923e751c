use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::warn;

use crate::db::services::user_service;
use crate::services::identity_service::IdentityError;
use crate::web::models::CurrentUser;
use crate::web::{AppState, error::AppError};

pub const SESSION_COOKIE: &str = "token";

fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false)
}

/// Resolves the session cookie to a `CurrentUser` request extension.
///
/// A missing/invalid token is Unauthenticated; a valid token whose uid has
/// no user record is Unauthorized. Page navigations are redirected to the
/// login page on either failure; AJAX callers get the JSON error instead.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Response {
    let ajax = is_ajax(req.headers());

    let user = match resolve_user(&state, &jar).await {
        Ok(user) => user,
        Err(e) => {
            return if ajax {
                e.into_response()
            } else {
                Redirect::to("/auth/login").into_response()
            };
        }
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}

async fn resolve_user(state: &AppState, jar: &CookieJar) -> Result<CurrentUser, AppError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthenticated("Not authenticated".to_string()))?;

    let session = state.identity.verify_session(&token).await.map_err(|e| {
        if let IdentityError::Provider(msg) | IdentityError::Network(msg) = &e {
            warn!(error = %msg, "Identity provider failure during session verification.");
        }
        AppError::from(e)
    })?;

    // Token valid but identity unknown here: authorization failure,
    // distinct from the authentication failures above.
    let user = user_service::get_user_by_uid(&state.db, &session.uid)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not registered".to_string()))?;

    Ok(CurrentUser {
        role: user.role(),
        uid: user.uid,
        email: session.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_is_ajax_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_ajax(&headers));

        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        assert!(is_ajax(&headers));

        headers.insert("x-requested-with", HeaderValue::from_static("xmlhttprequest"));
        assert!(is_ajax(&headers));
    }
}
