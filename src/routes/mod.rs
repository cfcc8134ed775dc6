use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware::{auth_redirects, refresh_token, session_user};
use crate::state::AppState;

pub mod assets;
pub mod auth;
pub mod home;
pub mod misc;
pub mod posts;
pub mod users;

/// The full application: routes, the auth pipeline, and the 404 fallback.
/// Every request passes refresh, user resolution, then the auth-area
/// redirect check before reaching a handler.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .route("/slack-invite", get(misc::slack_invite))
        .merge(auth::router())
        .merge(posts::router())
        .merge(users::router())
        .route("/{username}", get(users::show))
        .route("/{username}/{id}", get(posts::show))
        .fallback(home::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn_with_state(state.clone(), refresh_token))
                .layer(from_fn_with_state(state.clone(), session_user))
                .layer(from_fn(auth_redirects)),
        )
        .with_state(state)
}
