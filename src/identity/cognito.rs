use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cognitoidentityprovider::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use aws_sdk_cognitoidentityprovider::Client;

use super::IdentityError;

/// Attribute pairs exactly as the provider sends and receives them.
pub type Attributes = Vec<(String, String)>;

/// Tokens from an auth call. The refresh flow only returns a new access
/// token, so both fields stay optional here; the gateway decides what a
/// missing token means.
#[derive(Debug, Clone, Default)]
pub struct AuthTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Credentials for `initiate_auth`.
#[derive(Debug, Clone)]
pub enum AuthFlow<'a> {
    Password {
        username: &'a str,
        password: &'a str,
    },
    Refresh {
        refresh_token: &'a str,
    },
}

/// The raw provider calls the identity gateway is built on. Mirrors the
/// remote API one to one so tests can swap in a scripted double.
#[async_trait]
pub trait CognitoApi: Send + Sync {
    async fn sign_up(
        &self,
        client_id: &str,
        secret_hash: &str,
        username: &str,
        password: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError>;

    async fn confirm_sign_up(
        &self,
        client_id: &str,
        secret_hash: &str,
        username: &str,
        code: &str,
    ) -> Result<(), IdentityError>;

    async fn initiate_auth(
        &self,
        client_id: &str,
        secret_hash: &str,
        flow: AuthFlow<'_>,
    ) -> Result<AuthTokens, IdentityError>;

    async fn get_user(&self, access_token: &str) -> Result<Attributes, IdentityError>;

    async fn admin_get_user(
        &self,
        pool_id: &str,
        username: &str,
    ) -> Result<Attributes, IdentityError>;

    async fn update_user_attributes(
        &self,
        access_token: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError>;

    async fn change_password(
        &self,
        access_token: &str,
        previous: &str,
        proposed: &str,
    ) -> Result<(), IdentityError>;
}

/// Live Cognito client.
#[derive(Clone)]
pub struct CognitoIdp {
    client: Client,
}

impl CognitoIdp {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

/// Maps the provider's structured error codes onto typed variants so no
/// caller ever has to pattern-match message text.
fn identity_error<E, R>(op: &'static str, err: SdkError<E, R>) -> IdentityError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match err.meta().code() {
        Some("UsernameExistsException") => IdentityError::UsernameExists,
        Some("NotAuthorizedException") => IdentityError::NotAuthorized,
        Some("CodeMismatchException") => IdentityError::CodeMismatch,
        Some("ExpiredCodeException") => IdentityError::CodeExpired,
        Some("InvalidPasswordException") => IdentityError::InvalidPassword,
        Some("UserNotFoundException") => IdentityError::UserNotFound,
        _ => IdentityError::Provider {
            op,
            message: DisplayErrorContext(err).to_string(),
        },
    }
}

fn to_attribute_types(
    op: &'static str,
    attributes: Attributes,
) -> Result<Vec<AttributeType>, IdentityError> {
    attributes
        .into_iter()
        .map(|(name, value)| {
            AttributeType::builder()
                .name(name)
                .value(value)
                .build()
                .map_err(|err| IdentityError::Provider {
                    op,
                    message: err.to_string(),
                })
        })
        .collect()
}

fn from_attribute_types(attributes: Vec<AttributeType>) -> Attributes {
    attributes
        .into_iter()
        .map(|attr| (attr.name, attr.value.unwrap_or_default()))
        .collect()
}

#[async_trait]
impl CognitoApi for CognitoIdp {
    async fn sign_up(
        &self,
        client_id: &str,
        secret_hash: &str,
        username: &str,
        password: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError> {
        const OP: &str = "sign_up";
        self.client
            .sign_up()
            .client_id(client_id)
            .secret_hash(secret_hash)
            .username(username)
            .password(password)
            .set_user_attributes(Some(to_attribute_types(OP, attributes)?))
            .send()
            .await
            .map_err(|err| identity_error(OP, err))?;
        Ok(())
    }

    async fn confirm_sign_up(
        &self,
        client_id: &str,
        secret_hash: &str,
        username: &str,
        code: &str,
    ) -> Result<(), IdentityError> {
        self.client
            .confirm_sign_up()
            .client_id(client_id)
            .secret_hash(secret_hash)
            .username(username)
            .confirmation_code(code)
            .send()
            .await
            .map_err(|err| identity_error("confirm_sign_up", err))?;
        Ok(())
    }

    async fn initiate_auth(
        &self,
        client_id: &str,
        secret_hash: &str,
        flow: AuthFlow<'_>,
    ) -> Result<AuthTokens, IdentityError> {
        let request = match flow {
            AuthFlow::Password { username, password } => self
                .client
                .initiate_auth()
                .auth_flow(AuthFlowType::UserPasswordAuth)
                .auth_parameters("USERNAME", username)
                .auth_parameters("PASSWORD", password),
            AuthFlow::Refresh { refresh_token } => self
                .client
                .initiate_auth()
                .auth_flow(AuthFlowType::RefreshTokenAuth)
                .auth_parameters("REFRESH_TOKEN", refresh_token),
        };
        let out = request
            .auth_parameters("SECRET_HASH", secret_hash)
            .client_id(client_id)
            .send()
            .await
            .map_err(|err| identity_error("initiate_auth", err))?;
        Ok(out
            .authentication_result
            .map(|result| AuthTokens {
                access_token: result.access_token,
                refresh_token: result.refresh_token,
            })
            .unwrap_or_default())
    }

    async fn get_user(&self, access_token: &str) -> Result<Attributes, IdentityError> {
        let out = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|err| identity_error("get_user", err))?;
        Ok(from_attribute_types(out.user_attributes))
    }

    async fn admin_get_user(
        &self,
        pool_id: &str,
        username: &str,
    ) -> Result<Attributes, IdentityError> {
        let out = self
            .client
            .admin_get_user()
            .user_pool_id(pool_id)
            .username(username)
            .send()
            .await
            .map_err(|err| identity_error("admin_get_user", err))?;
        Ok(from_attribute_types(out.user_attributes.unwrap_or_default()))
    }

    async fn update_user_attributes(
        &self,
        access_token: &str,
        attributes: Attributes,
    ) -> Result<(), IdentityError> {
        const OP: &str = "update_user_attributes";
        self.client
            .update_user_attributes()
            .access_token(access_token)
            .set_user_attributes(Some(to_attribute_types(OP, attributes)?))
            .send()
            .await
            .map_err(|err| identity_error(OP, err))?;
        Ok(())
    }

    async fn change_password(
        &self,
        access_token: &str,
        previous: &str,
        proposed: &str,
    ) -> Result<(), IdentityError> {
        self.client
            .change_password()
            .access_token(access_token)
            .previous_password(previous)
            .proposed_password(proposed)
            .send()
            .await
            .map_err(|err| identity_error("change_password", err))?;
        Ok(())
    }
}
