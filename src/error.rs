//! Subsystem error taxonomy and its HTTP rendering.
//!
//! Every variant except `Internal` is operational: expected, client-facing,
//! and safe to surface with its message. `Internal` wraps unexpected faults;
//! its chain is logged and the client only sees a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("This email address is already registered")]
    DuplicateEmail,
    #[error("Token is invalid or has expired")]
    InvalidOrExpiredResetToken,
    #[error("You are not logged in. Please log in to get access")]
    MissingToken,
    #[error("Invalid token. Please log in again")]
    InvalidToken,
    #[error("Your token has expired. Please log in again")]
    ExpiredToken,
    #[error("The identity belonging to this token no longer exists")]
    IdentityGone,
    #[error("Password was recently changed. Please log in again")]
    StaleSession,
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("You do not have permission to perform this action")]
    Forbidden,
    #[error("There is no identity with that email address")]
    NotFound,
    #[error("There was an error sending the notification. Try again later")]
    NotificationDeliveryFailed,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::DuplicateEmail
            | Error::InvalidOrExpiredResetToken => StatusCode::BAD_REQUEST,
            Error::MissingToken
            | Error::InvalidToken
            | Error::ExpiredToken
            | Error::IdentityGone
            | Error::StaleSession
            | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::NotificationDeliveryFailed | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    #[must_use]
    pub fn is_operational(&self) -> bool {
        !matches!(self, Error::Internal(_))
    }
}

impl From<crate::store::StoreError> for Error {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::DuplicateEmail => Error::DuplicateEmail,
            crate::store::StoreError::Backend(err) => Error::Internal(err),
        }
    }
}

impl From<crate::token::TokenError> for Error {
    fn from(err: crate::token::TokenError) -> Self {
        match err {
            crate::token::TokenError::Expired => Error::ExpiredToken,
            crate::token::TokenError::Invalid => Error::InvalidToken,
            // Signing failures and weak secrets are configuration faults.
            err => Error::Internal(anyhow::Error::new(err)),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // 4xx are client failures, 5xx are ours.
        let status_word = if status.is_client_error() {
            "fail"
        } else {
            "error"
        };
        let message = if self.is_operational() {
            self.to_string()
        } else {
            if let Error::Internal(err) = &self {
                error!("internal error: {err:#}");
            }
            "Something went very wrong!".to_string()
        };
        let body = Json(json!({ "status": status_word, "message": message }));
        (status, body).into_response()
    }
}
