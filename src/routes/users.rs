use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::{CurrentToken, CurrentUser, MaybeUser};
use crate::identity::{IdentityError, User};
use crate::routes::home::{not_found, Html};
use crate::routes::posts::attach_like_counts;
use crate::session::{Flash, Session};
use crate::state::AppState;
use crate::store::post::Post;

/// Provider-side ceiling on the bio attribute.
const BIO_LIMIT: usize = 128;

#[derive(Template)]
#[template(path = "pages/user.html")]
pub struct UserPostsTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
    pub author: User,
    pub posts: Vec<Post>,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "pages/security.html")]
pub struct SecurityTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
}

#[derive(Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub website: String,
}

#[derive(Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_new_password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile_page))
        .route("/update", post(update_profile))
        .route("/security", get(security_page).post(change_password))
}

/// GET /{username}, the public listing. Unknown names get the 404 page.
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let Some(author) = state.identity.get_user(&username).await? else {
        return Ok(not_found().await);
    };

    let mut posts = state.posts.get_user_posts(&username).await?;
    attach_like_counts(state.likes.as_ref(), &mut posts).await;

    let (session, flash) = session.take_flash();

    Ok((
        session,
        Html(UserPostsTemplate {
            user,
            flash,
            author,
            posts,
        }),
    )
        .into_response())
}

/// GET /profile.
async fn profile_page(session: Session, CurrentUser(user): CurrentUser) -> Response {
    let (session, flash) = session.take_flash();
    (
        session,
        Html(ProfileTemplate {
            user: Some(user),
            flash,
        }),
    )
        .into_response()
}

/// POST /update. The bio is clipped to its attribute ceiling before the
/// provider sees it.
async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    CurrentToken(token): CurrentToken,
    Form(form): Form<ProfileForm>,
) -> Response {
    let attributes = vec![
        ("name".to_owned(), form.name),
        ("locale".to_owned(), form.locale),
        ("profile".to_owned(), clip(&form.profile, BIO_LIMIT)),
        ("website".to_owned(), form.website),
    ];

    match state.identity.update_user(&token, attributes).await {
        Ok(()) => {
            let session = session.set_flash("success", "Profile Updated");
            (session, Redirect::to("/profile")).into_response()
        }
        Err(error) => {
            tracing::error!(%error, "profile update failed");
            let session = session.set_flash("error", "Could not update your profile. Try again!");
            (session, Redirect::to("/")).into_response()
        }
    }
}

/// GET /security.
async fn security_page(session: Session, CurrentUser(user): CurrentUser) -> Response {
    let (session, flash) = session.take_flash();
    (
        session,
        Html(SecurityTemplate {
            user: Some(user),
            flash,
        }),
    )
        .into_response()
}

/// POST /security. Validation failures and provider rejections all land
/// back on the form with a flash.
async fn change_password(
    State(state): State<AppState>,
    session: Session,
    CurrentToken(token): CurrentToken,
    Form(form): Form<PasswordForm>,
) -> Response {
    if let Err(message) = validate_password_change(&form) {
        let session = session.set_flash("error", message);
        return (session, Redirect::to("/security")).into_response();
    }

    let session = match state
        .identity
        .change_password(&token, &form.old_password, &form.new_password)
        .await
    {
        Ok(()) => session.set_flash("success", "Password updated!"),
        Err(IdentityError::NotAuthorized) => {
            session.set_flash("error", "Old password is incorrect")
        }
        Err(IdentityError::InvalidPassword) => {
            session.set_flash("error", "Password does not meet the requirements")
        }
        Err(error) => {
            tracing::error!(%error, "password change failed");
            session.set_flash("error", "Could not update your password. Try again!")
        }
    };

    (session, Redirect::to("/security")).into_response()
}

fn validate_password_change(form: &PasswordForm) -> Result<(), &'static str> {
    if form.old_password.is_empty() || form.new_password.is_empty() {
        return Err("Password is required");
    }
    if form.new_password != form.confirm_new_password {
        return Err("Passwords dont match");
    }
    if form.new_password == form.old_password {
        return Err("Please dont use the same password");
    }
    Ok(())
}

/// Truncates on a character boundary, never mid-codepoint.
fn clip(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
