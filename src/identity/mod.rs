use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub mod cognito;

use cognito::{AuthFlow, CognitoApi};
pub use cognito::Attributes;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("account already exists")]
    UsernameExists,
    #[error("incorrect credentials")]
    NotAuthorized,
    #[error("verification code mismatch")]
    CodeMismatch,
    #[error("verification code expired")]
    CodeExpired,
    #[error("password does not meet requirements")]
    InvalidPassword,
    #[error("no such user")]
    UserNotFound,
    #[error("{op}: {message}")]
    Provider { op: &'static str, message: String },
}

/// Transient projection of a provider identity. Built fresh from
/// attribute pairs on every resolution, never persisted locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub locale: String,
    pub website: String,
    pub picture: String,
}

impl User {
    /// Zero pairs means no user; unrecognized attribute names are ignored.
    /// There is no partially-resolved state: either the fetch produced
    /// attributes and this returns a full projection, or it returns `None`.
    pub fn from_attributes(attributes: &[(String, String)]) -> Option<User> {
        if attributes.is_empty() {
            return None;
        }
        let mut user = User::default();
        for (name, value) in attributes {
            match name.as_str() {
                "sub" => user.id = value.clone(),
                "nickname" => user.username = value.clone(),
                "name" => user.name = value.clone(),
                "email" => user.email = value.clone(),
                "profile" => user.bio = value.clone(),
                "locale" => user.locale = value.clone(),
                "website" => user.website = value.clone(),
                "picture" => user.picture = value.clone(),
                _ => {}
            }
        }
        Some(user)
    }
}

/// Access/refresh pair from a password login.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Everything the rest of the app may ask of the identity provider.
/// One remote attempt per call; no retries, no backoff.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn signup(
        &self,
        username: &str,
        password: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError>;
    async fn verify(&self, username: &str, code: &str) -> Result<(), IdentityError>;
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, IdentityError>;
    /// Resolves the identity behind a live access token; zero attributes
    /// resolves to `None`.
    async fn account_details(&self, access_token: &str) -> Result<Option<User>, IdentityError>;
    /// Administrative lookup by username, for public profile pages.
    /// An unknown username is `Ok(None)`, not an error.
    async fn get_user(&self, username: &str) -> Result<Option<User>, IdentityError>;
    async fn update_user(
        &self,
        access_token: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError>;
    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), IdentityError>;
    /// Exchanges the long-lived refresh token for a fresh access token.
    async fn get_token(&self, username: &str, refresh_token: &str)
        -> Result<String, IdentityError>;
}

pub type DynIdentityService = Arc<dyn IdentityService>;

/// base64(HMAC-SHA256(key: client secret, message: username + client id)),
/// the provider's secret verification parameter.
pub fn secret_hash(client_secret: &str, username: &str, client_id: &str) -> String {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(client_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Gateway over the provider API: computes the per-call secret hash,
/// projects attribute pairs into [`User`]s and normalizes not-found.
pub struct IdentityClient {
    client_id: String,
    client_secret: String,
    pool_id: String,
    api: Arc<dyn CognitoApi>,
}

impl IdentityClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        pool_id: impl Into<String>,
        api: Arc<dyn CognitoApi>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            pool_id: pool_id.into(),
            api,
        }
    }

    fn secret_hash(&self, username: &str) -> String {
        secret_hash(&self.client_secret, username, &self.client_id)
    }
}

#[async_trait]
impl IdentityService for IdentityClient {
    async fn signup(
        &self,
        username: &str,
        password: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError> {
        self.api
            .sign_up(
                &self.client_id,
                &self.secret_hash(username),
                username,
                password,
                attributes,
            )
            .await
    }

    async fn verify(&self, username: &str, code: &str) -> Result<(), IdentityError> {
        self.api
            .confirm_sign_up(&self.client_id, &self.secret_hash(username), username, code)
            .await
    }

    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, IdentityError> {
        let tokens = self
            .api
            .initiate_auth(
                &self.client_id,
                &self.secret_hash(username),
                AuthFlow::Password { username, password },
            )
            .await?;
        match (tokens.access_token, tokens.refresh_token) {
            (Some(access_token), Some(refresh_token)) => Ok(TokenPair {
                access_token,
                refresh_token,
            }),
            _ => Err(IdentityError::Provider {
                op: "login",
                message: "authentication result carried no token pair".into(),
            }),
        }
    }

    async fn account_details(&self, access_token: &str) -> Result<Option<User>, IdentityError> {
        let attributes = self.api.get_user(access_token).await?;
        Ok(User::from_attributes(&attributes))
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, IdentityError> {
        match self.api.admin_get_user(&self.pool_id, username).await {
            Ok(attributes) => Ok(User::from_attributes(&attributes)),
            Err(IdentityError::UserNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update_user(
        &self,
        access_token: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError> {
        self.api
            .update_user_attributes(access_token, attributes)
            .await
    }

    async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        self.api
            .change_password(access_token, old_password, new_password)
            .await
    }

    async fn get_token(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> Result<String, IdentityError> {
        let tokens = self
            .api
            .initiate_auth(
                &self.client_id,
                &self.secret_hash(username),
                AuthFlow::Refresh { refresh_token },
            )
            .await?;
        tokens.access_token.ok_or_else(|| IdentityError::Provider {
            op: "get_token",
            message: "refresh produced no access token".into(),
        })
    }
}
