//! Session-cookie authentication.
//!
//! Login screens live outside this service; it only resolves the opaque
//! session token to a user. Handlers that require authentication use the
//! [`AuthContext`] extractor, whose rejection is a redirect to the login
//! page with the original path preserved in `next`.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::application::error::ErrorReport;
use crate::domain::entities::UserRecord;

use super::{SESSION_COOKIE, public::HttpState};

/// A resolved, signed-in user. Extraction fails with a login redirect.
#[derive(Clone)]
pub struct AuthContext {
    pub user: UserRecord,
}

/// The viewer if a valid session cookie is present, anonymous otherwise.
#[derive(Clone)]
pub struct MaybeAuth(pub Option<UserRecord>);

/// Redirect to the external login screen, round-tripping the original path.
pub fn login_redirect(next: &str) -> Response {
    Redirect::to(&format!("/auth/login/?next={next}")).into_response()
}

async fn resolve_session(state: &HttpState, parts: &Parts) -> Option<UserRecord> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar.get(SESSION_COOKIE)?.value().to_string();

    match state.db_sessions.find_user(&token).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(
                target = "yatube::http::auth",
                error = %err,
                "session lookup failed, treating request as anonymous"
            );
            None
        }
    }
}

impl<S> FromRequestParts<S> for MaybeAuth
where
    HttpState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = HttpState::from_ref(state);
        Ok(MaybeAuth(resolve_session(&state, parts).await))
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    HttpState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = HttpState::from_ref(state);
        match resolve_session(&state, parts).await {
            Some(user) => Ok(AuthContext { user }),
            None => {
                let mut response = login_redirect(parts.uri.path());
                ErrorReport::from_message(
                    "infra::http::auth::AuthContext",
                    StatusCode::SEE_OTHER,
                    "anonymous request to authenticated route",
                )
                .attach(&mut response);
                Err(response)
            }
        }
    }
}
