use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use url::Url;

use crate::state::AppState;

const SLACK_INVITE_ENDPOINT: &str = "https://slack.com/api/users.admin.invite";

#[derive(Deserialize)]
pub struct InviteQuery {
    #[serde(default)]
    pub email: String,
}

/// GET /slack-invite proxies the workspace invite API. A missing token or
/// a failed call collapses into the API's own error shape.
pub async fn slack_invite(
    State(state): State<AppState>,
    Query(query): Query<InviteQuery>,
) -> Response {
    let body = request_invite(&state, &query.email)
        .await
        .unwrap_or_else(|| r#"{"ok":false}"#.to_owned());

    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn request_invite(state: &AppState, email: &str) -> Option<String> {
    let token = state.config.slack_token.as_deref()?;

    let url = Url::parse_with_params(SLACK_INVITE_ENDPOINT, [("token", token), ("email", email)])
        .ok()?;

    state.http.get(url).send().await.ok()?.text().await.ok()
}
