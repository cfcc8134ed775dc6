use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::identity::IdentityError;
use crate::store::StoreError;

/// Failures a page handler propagates instead of flashing: unexpected
/// store or provider faults. Validation problems and expected not-found
/// outcomes never become an `AppError`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Store(err) => {
                tracing::error!("store error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Identity(err) => {
                tracing::error!("identity provider error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, "Internal server error").into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
