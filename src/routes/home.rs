use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::identity::User;
use crate::routes::posts::attach_like_counts;
use crate::session::{Flash, Session};
use crate::state::AppState;
use crate::store::post::Post;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
    pub posts: Vec<Post>,
    pub post_count: i64,
}

#[derive(Template)]
#[template(path = "pages/notfound.html")]
pub struct NotFoundTemplate;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// GET / renders the feed of published posts, newest first.
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
) -> AppResult<Response> {
    let mut posts = state.posts.get_posts().await?;
    attach_like_counts(state.likes.as_ref(), &mut posts).await;

    let post_count = state.posts.get_count().await;
    let (session, flash) = session.take_flash();

    Ok((
        session,
        Html(HomeTemplate {
            user,
            flash,
            posts,
            post_count,
        }),
    )
        .into_response())
}

/// Fallback for unknown paths and unknown users/posts.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(NotFoundTemplate)).into_response()
}
