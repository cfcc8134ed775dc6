use askama::Template;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::config::GithubConfig;
use crate::extractors::MaybeUser;
use crate::identity::{Attributes, IdentityError, User};
use crate::routes::home::Html;
use crate::session::{Flash, Session};
use crate::state::AppState;

const GITHUB_OAUTH_ENDPOINT: &str = "https://github.com/login/oauth";
const GITHUB_USER_ENDPOINT: &str = "https://api.github.com/user";

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
    pub github_url: Option<String>,
    pub prefill: Option<SignupPrefill>,
}

#[derive(Template)]
#[template(path = "pages/verify.html")]
pub struct VerifyTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
    pub username: String,
}

#[derive(Template)]
#[template(path = "pages/verified.html")]
pub struct VerifiedTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub user: Option<User>,
    pub flash: Option<Flash>,
}

/// Raw GitHub profile payload; most fields come back null for sparse
/// accounts.
#[derive(Debug, Deserialize)]
struct GithubProfile {
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    blog: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

/// Signup form prefill, already defaulted for rendering.
#[derive(Debug, Clone, Default)]
pub struct SignupPrefill {
    pub login: String,
    pub name: String,
    pub email: String,
    pub website: String,
    pub location: String,
    pub picture: String,
}

impl From<GithubProfile> for SignupPrefill {
    fn from(profile: GithubProfile) -> Self {
        Self {
            login: profile.login,
            name: profile.name.unwrap_or_default(),
            email: profile.email.unwrap_or_default(),
            website: profile.blog.unwrap_or_default(),
            location: profile.location.unwrap_or_default(),
            picture: profile.avatar_url.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
pub struct SignupQuery {
    pub code: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub username: String,
    pub code: Option<String>,
}

#[derive(Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub picture: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", get(signup_page).post(finish_signup))
        .route("/verify", get(verify))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

/// GET /signup. Plain form by default; `?code=` runs the OAuth exchange
/// and `?access_token=` renders the form prefilled from the GitHub
/// profile. Both assist branches need the OAuth app configured.
async fn signup_page(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Query(query): Query<SignupQuery>,
) -> Response {
    let github = state.config.github.as_ref();

    if let (Some(github), Some(code)) = (github, query.code.as_deref()) {
        return exchange_code(&state, session, github, code).await;
    }

    if let (Some(_), Some(token)) = (github, query.access_token.as_deref()) {
        return prefilled_form(&state, session, user, token).await;
    }

    let (session, flash) = session.take_flash();
    (
        session,
        Html(SignupTemplate {
            user,
            flash,
            github_url: github.map(authorize_url),
            prefill: None,
        }),
    )
        .into_response()
}

/// POST /signup.
async fn finish_signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Response {
    let attributes: Attributes = vec![
        ("email".to_owned(), form.email.clone()),
        ("locale".to_owned(), form.locale),
        ("website".to_owned(), form.website),
        ("picture".to_owned(), form.picture),
        ("nickname".to_owned(), form.login),
    ];

    match state
        .identity
        .signup(&form.email, &form.password, attributes)
        .await
    {
        Ok(()) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("username", &form.email)
                .finish();
            Redirect::to(&format!("/verify?{query}")).into_response()
        }
        Err(IdentityError::UsernameExists) => {
            let session = session.set_flash("error", "Account exists already");
            (session, Redirect::to("/")).into_response()
        }
        Err(error) => {
            tracing::error!(%error, "signup failed");
            let session = session.set_flash("error", "Could not sign you up. Try again!");
            (session, Redirect::to("/")).into_response()
        }
    }
}

/// GET /verify. With a code, runs the confirmation and bounces back here;
/// without one, shows the code form, or the celebration page right after
/// a successful confirmation.
async fn verify(
    State(state): State<AppState>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Query(query): Query<VerifyQuery>,
) -> Response {
    if let Some(code) = query.code.as_deref() {
        return match state.identity.verify(&query.username, code).await {
            Ok(()) => {
                let session = session.set_flash("success", "Account Verified!");
                (session, Redirect::to("/verify")).into_response()
            }
            Err(error) => {
                tracing::debug!(%error, "verification failed");
                let session = session.set_flash("error", "Verification failed. Try again!");
                let retry = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("username", &query.username)
                    .finish();
                (session, Redirect::to(&format!("/verify?{retry}"))).into_response()
            }
        };
    }

    let (session, flash) = session.take_flash();

    if flash.as_ref().is_some_and(|flash| flash.kind == "success") {
        return (session, Html(VerifiedTemplate { user, flash })).into_response();
    }

    (
        session,
        Html(VerifyTemplate {
            user,
            flash,
            username: query.username,
        }),
    )
        .into_response()
}

/// GET /login.
async fn login_page(session: Session, MaybeUser(user): MaybeUser) -> Response {
    let (session, flash) = session.take_flash();
    (session, Html(LoginTemplate { user, flash })).into_response()
}

/// POST /login. A successful login stores the refresh token in the
/// session cookie; the per-request pipeline trades it for access tokens
/// from then on.
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.identity.login(&form.email, &form.password).await {
        Ok(pair) => {
            let session = session.set_user(&form.email, &pair.refresh_token);
            (session, Redirect::to("/")).into_response()
        }
        Err(error) => {
            tracing::debug!(%error, "login failed");
            let session = session.set_flash("error", "Incorrect email or password!");
            (session, Redirect::to("/login")).into_response()
        }
    }
}

/// GET /logout.
async fn logout(session: Session) -> Response {
    (session.clear_user(), Redirect::to("/")).into_response()
}

async fn exchange_code(
    state: &AppState,
    session: Session,
    github: &GithubConfig,
    code: &str,
) -> Response {
    match fetch_access_token(state, github, code).await {
        Some(token) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("access_token", &token)
                .finish();
            Redirect::to(&format!("/signup?{query}")).into_response()
        }
        None => {
            let session = session.set_flash("error", "Invalid or expired code!");
            (session, Redirect::to("/signup")).into_response()
        }
    }
}

/// POSTs the exchange endpoint and pulls `access_token` out of the
/// urlencoded response body.
async fn fetch_access_token(state: &AppState, github: &GithubConfig, code: &str) -> Option<String> {
    let empty: [(&str, &str); 0] = [];
    let body = state
        .http
        .post(exchange_url(github, code))
        .form(&empty)
        .send()
        .await
        .ok()?
        .text()
        .await
        .ok()?;

    url::form_urlencoded::parse(body.as_bytes())
        .find(|(name, _)| name == "access_token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

async fn prefilled_form(
    state: &AppState,
    session: Session,
    user: Option<User>,
    token: &str,
) -> Response {
    let response = state
        .http
        .get(GITHUB_USER_ENDPOINT)
        .header(header::AUTHORIZATION, format!("token {token}"))
        .send()
        .await;

    let response = match response {
        Ok(response) if response.status().is_success() => response,
        Ok(_) | Err(_) => {
            let session = session.set_flash("error", "Invalid or expired token!");
            return (session, Redirect::to("/signup")).into_response();
        }
    };

    let profile: GithubProfile = match response.json().await {
        Ok(profile) => profile,
        Err(error) => {
            tracing::debug!(%error, "github profile decode failed");
            let session = session.set_flash("error", "An error occured!");
            return (session, Redirect::to("/signup")).into_response();
        }
    };

    let (session, flash) = session.take_flash();
    (
        session,
        Html(SignupTemplate {
            user,
            flash,
            github_url: None,
            prefill: Some(profile.into()),
        }),
    )
        .into_response()
}

fn authorize_url(github: &GithubConfig) -> String {
    format!(
        "{GITHUB_OAUTH_ENDPOINT}/authorize?client_id={}&callback_url={}",
        github.client_id, github.callback
    )
}

fn exchange_url(github: &GithubConfig, code: &str) -> String {
    format!(
        "{GITHUB_OAUTH_ENDPOINT}/access_token?client_id={}&callback_url={}&client_secret={}&code={}",
        github.client_id, github.callback, github.client_secret, code
    )
}
