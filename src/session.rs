use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::ResponseParts;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};

pub const USER_COOKIE: &str = "user";
pub const FLASH_COOKIE: &str = "notification";

const FLASH_SEPARATOR: &str = "<>";

/// The `user` cookie payload. Only meaningful with both fields present;
/// the token is the provider's long-lived refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub username: String,
    pub token: String,
}

/// One-shot notification, encoded `kind<>message` in its cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct Flash {
    pub kind: String,
    pub message: String,
}

impl Flash {
    fn parse(raw: &str) -> Option<Flash> {
        let (kind, message) = raw.split_once(FLASH_SEPARATOR)?;
        Some(Flash {
            kind: kind.to_owned(),
            message: message.to_owned(),
        })
    }
}

/// Encrypted cookie session. Methods consume and return `self` the way
/// the underlying jar does; handlers return the session so the cookie
/// delta lands on the response.
pub struct Session {
    jar: PrivateCookieJar,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap, key: Key) -> Self {
        Self {
            jar: PrivateCookieJar::from_headers(headers, key),
        }
    }

    /// Present only when both the username and the token survived the
    /// round trip; partial state reads as signed-out.
    pub fn user(&self) -> Option<SessionUser> {
        let cookie = self.jar.get(USER_COOKIE)?;
        let user: SessionUser = serde_json::from_str(cookie.value()).ok()?;
        if user.username.is_empty() || user.token.is_empty() {
            return None;
        }
        Some(user)
    }

    pub fn set_user(self, username: &str, token: &str) -> Self {
        let payload = serde_json::to_string(&SessionUser {
            username: username.to_owned(),
            token: token.to_owned(),
        })
        .expect("session user serializes");
        Self {
            jar: self.jar.add(session_cookie(USER_COOKIE, payload)),
        }
    }

    pub fn clear_user(self) -> Self {
        Self {
            jar: self.jar.remove(removal_cookie(USER_COOKIE)),
        }
    }

    pub fn set_flash(self, kind: &str, message: &str) -> Self {
        let payload = format!("{kind}{FLASH_SEPARATOR}{message}");
        Self {
            jar: self.jar.add(session_cookie(FLASH_COOKIE, payload)),
        }
    }

    /// Reads and clears in one step; the second call in a cycle gets
    /// nothing.
    pub fn take_flash(self) -> (Self, Option<Flash>) {
        match self.jar.get(FLASH_COOKIE) {
            Some(cookie) => {
                let flash = Flash::parse(cookie.value());
                let jar = self.jar.remove(removal_cookie(FLASH_COOKIE));
                (Self { jar }, flash)
            }
            None => (self, None),
        }
    }
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let key = Key::from_ref(state);
        Ok(Session::from_headers(&parts.headers, key))
    }
}

impl axum::response::IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.jar.into_response_parts(res)
    }
}
