use std::sync::LazyLock;

use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post, put};
use axum::{Form, Router};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::identity::User;
use crate::routes::home::{not_found, Html};
use crate::session::{Flash, Session};
use crate::state::AppState;
use crate::store::like::LikeStore;
use crate::store::post::{reading_time, NewPost, Post};

/// Cap on concurrent like-count lookups when decorating a listing.
const LIKE_COUNT_CONCURRENCY: usize = 8;

static DESCRIPTION_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9.\-\s/:,;]+").expect("description pattern compiles")
});

#[derive(Template)]
#[template(path = "pages/new.html")]
pub struct NewPostTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "pages/edit.html")]
pub struct EditPostTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
    pub post: Post,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
    pub post: Post,
    pub description: String,
    pub liker: bool,
}

#[derive(Deserialize)]
pub struct NewPostForm {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub publish: i64,
}

#[derive(Deserialize)]
pub struct UpdatePostForm {
    pub id: String,
    #[serde(default)]
    pub cover: String,
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", get(new_page).post(create))
        .route("/edit/{id}", get(edit_page))
        .route("/edit", post(update))
        .route("/like/{id}", put(toggle_like))
}

/// GET /new renders the composer.
async fn new_page(CurrentUser(user): CurrentUser) -> Response {
    Html(NewPostTemplate {
        user: Some(user),
        flash: None,
    })
    .into_response()
}

/// POST /new. The author fields come from the signed-in user, never from
/// the form.
async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<NewPostForm>,
) -> Response {
    let author = if user.name.is_empty() {
        user.username.clone()
    } else {
        user.name.clone()
    };

    let new = NewPost {
        title: form.title,
        reading_time: reading_time(&form.content),
        content: form.content,
        cover: form.cover,
        author,
        username: user.username,
        user_pic: user.picture,
        publish: form.publish,
    };

    match state.posts.create_post(new).await {
        Ok(post) => Redirect::to(&format!("/{}/{}", post.username, post.id)).into_response(),
        Err(error) => {
            tracing::error!(%error, "create post failed");
            Redirect::to("/new").into_response()
        }
    }
}

/// GET /edit/{id}. The lookup is scoped to the signed-in user, so someone
/// else's id turns you home.
async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some(post) = state.posts.get_post(&user.username, &id).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let (session, flash) = session.take_flash();

    Ok((
        session,
        Html(EditPostTemplate {
            user: Some(user),
            flash,
            post,
        }),
    )
        .into_response())
}

/// POST /edit. Ownership is re-checked before the row is touched and the
/// stored created stamp keys the update, so the form cannot point the
/// write at another author's row.
async fn update(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<UpdatePostForm>,
) -> AppResult<Response> {
    let Some(post) = state.posts.get_post(&user.username, &form.id).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let session = match state
        .posts
        .update_post(&post.id, &form.cover, &form.content, post.created)
        .await
    {
        Ok(()) => session.set_flash("success", "Changes saved successfully!"),
        Err(error) => {
            tracing::error!(%error, post = %post.id, "update post failed");
            session.set_flash("error", "An error occurred. Try again.")
        }
    };

    Ok((session, Redirect::to(&format!("/edit/{}", post.id))).into_response())
}

/// GET /{username}/{id}, the public post page.
pub async fn show(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path((username, id)): Path<(String, String)>,
) -> AppResult<Response> {
    let Some(mut post) = state.posts.get_post(&username, &id).await? else {
        return Ok(not_found().await);
    };

    // Older rows predate the stored estimate.
    post.reading_time = reading_time(&post.content);

    let mut liker = false;
    if let Some(user) = &user {
        liker = matches!(
            state.likes.get_like(&post.id, &user.username).await,
            Ok(Some(_))
        );
    }

    match state.likes.get_likes(&post.id).await {
        Ok(rows) => post.likes_count = rows.len() as i64,
        Err(error) => tracing::debug!(post = %post.id, %error, "like count lookup failed"),
    }

    let description = description_of(&post.content);

    Ok(Html(PostTemplate {
        user,
        flash: None,
        post,
        description,
        liker,
    })
    .into_response())
}

/// PUT /like/{id}. Anonymous callers get the same error body as a failed
/// toggle.
async fn toggle_like(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> Response {
    let Some(user) = user else {
        return (StatusCode::BAD_REQUEST, "error").into_response();
    };

    match state.likes.toggle_like(&id, &user.username).await {
        Ok(()) => "ok".into_response(),
        Err(error) => {
            tracing::error!(%error, post = %id, "toggle like failed");
            (StatusCode::BAD_REQUEST, "error").into_response()
        }
    }
}

/// Fills in `likes_count` for every post in the slice, a bounded number
/// of lookups at a time. A failed lookup logs and leaves that one post at
/// zero without disturbing its siblings.
pub(crate) async fn attach_like_counts(likes: &dyn LikeStore, posts: &mut [Post]) {
    let ids: Vec<(usize, String)> = posts
        .iter()
        .map(|post| post.id.clone())
        .enumerate()
        .collect();

    let results: Vec<(usize, Result<usize, _>)> = stream::iter(ids)
        .map(|(idx, id)| async move { (idx, likes.get_likes(&id).await.map(|rows| rows.len())) })
        .buffer_unordered(LIKE_COUNT_CONCURRENCY)
        .collect()
        .await;

    for (idx, result) in results {
        match result {
            Ok(count) => posts[idx].likes_count = count as i64,
            Err(error) => {
                tracing::warn!(post = %posts[idx].id, %error, "like count lookup failed");
            }
        }
    }
}

/// Meta description for a post page: the second paragraph when there is
/// one, stripped down to plain prose characters, otherwise the first.
fn description_of(content: &str) -> String {
    let mut chunks = content.split("\r\n\r\n");
    let first = chunks.next().unwrap_or_default();

    match chunks.next() {
        Some(second) => DESCRIPTION_CHARS
            .find_iter(second)
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        None => first.to_string(),
    }
}
