use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Redirect;

use crate::identity::User;

/// Fresh access token minted by the token-refresh stage for this request.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

/// Requires a resolved user. Handlers that demand a signed-in visitor
/// declare this; the rejection sends everyone else home, which keeps the
/// redirect decision with the handler rather than the middleware.
#[derive(Debug)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| Redirect::to("/"))
    }
}

/// Optional user, for pages that render either way.
pub struct MaybeUser(pub Option<User>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<User>().cloned()))
    }
}

/// Requires this request's access token; profile and password flows send
/// it on to the identity provider.
#[derive(Debug)]
pub struct CurrentToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CurrentToken {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessToken>()
            .map(|token| CurrentToken(token.0.clone()))
            .ok_or_else(|| Redirect::to("/login"))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use axum::response::IntoResponse;

    use super::*;

    fn parts() -> Parts {
        Request::builder().uri("/new").body(()).unwrap().into_parts().0
    }

    #[test]
    fn current_user_reads_the_resolved_user() {
        let mut parts = parts();
        let user = User {
            username: "ana".into(),
            ..Default::default()
        };
        parts.extensions.insert(user.clone());

        let got = tokio_test::block_on(CurrentUser::from_request_parts(&mut parts, &())).unwrap();
        assert_eq!(got.0, user);
    }

    #[test]
    fn current_user_redirects_home_when_absent() {
        let mut parts = parts();
        let rejection =
            tokio_test::block_on(CurrentUser::from_request_parts(&mut parts, &())).unwrap_err();
        let response = rejection.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/");
    }

    #[test]
    fn maybe_user_never_rejects() {
        let mut parts = parts();
        let got = tokio_test::block_on(MaybeUser::from_request_parts(&mut parts, &())).unwrap();
        assert!(got.0.is_none());
    }

    #[test]
    fn current_token_redirects_to_login_when_absent() {
        let mut parts = parts();
        let rejection =
            tokio_test::block_on(CurrentToken::from_request_parts(&mut parts, &())).unwrap_err();
        let response = rejection.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login");
    }

    #[test]
    fn current_token_reads_the_refreshed_token() {
        let mut parts = parts();
        parts.extensions.insert(AccessToken("fresh".into()));
        let got = tokio_test::block_on(CurrentToken::from_request_parts(&mut parts, &())).unwrap();
        assert_eq!(got.0, "fresh");
    }
}
