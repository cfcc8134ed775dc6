use std::sync::LazyLock;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use regex::Regex;

use crate::extractors::AccessToken;
use crate::identity::User;
use crate::session::Session;
use crate::state::AppState;

static AUTH_PATHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/(signup|login|verify)").expect("auth path pattern compiles")
});

/// Exchanges the session's refresh token for a fresh access token and
/// stashes it in the request extensions. The provider's access tokens are
/// short-lived, so every request re-mints one; any failure leaves the
/// request unauthenticated for this cycle and is never fatal.
pub async fn refresh_token(
    State(state): State<AppState>,
    session: Session,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(user) = session.user() {
        match state.identity.get_token(&user.username, &user.token).await {
            Ok(token) => {
                req.extensions_mut().insert(AccessToken(token));
            }
            Err(error) => {
                tracing::debug!(username = %user.username, %error, "token refresh failed");
            }
        }
    }

    next.run(req).await
}

/// Resolves the visitor behind this cycle's access token and attaches the
/// projection to the request extensions. No token, a failed lookup, or an
/// empty attribute set all leave the request anonymous.
pub async fn session_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req.extensions().get::<AccessToken>().cloned();

    if let Some(AccessToken(token)) = token {
        match state.identity.account_details(&token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => {}
            Err(error) => {
                tracing::debug!(%error, "account details lookup failed");
            }
        }
    }

    next.run(req).await
}

/// Sends signed-in visitors away from the auth forms. The reverse check,
/// keeping anonymous visitors off protected pages, is each handler's own
/// responsibility.
pub async fn auth_redirects(req: Request, next: Next) -> Response {
    let path = req.uri().path();

    if path != "/" && AUTH_PATHS.is_match(path) && req.extensions().get::<User>().is_some() {
        return Redirect::to("/").into_response();
    }

    next.run(req).await
}
