use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Everything an operation can fail with, translated to a structured JSON
/// response at the boundary. Messages are the user-visible strings; unknown
/// email and wrong password share one variant on login so neither path
/// reveals whether the account exists.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("User already exists")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not verified. A new verification OTP has been sent to your email.")]
    UnverifiedEmail,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("OTP not found. Please request a new one.")]
    NoPendingOtp,

    #[error("OTP has expired. Please request a new one.")]
    OtpExpired,

    #[error("Invalid OTP")]
    OtpMismatch,

    #[error("Not authorized, no token provided")]
    MissingToken,

    #[error("Not authorized, token failed")]
    InvalidToken,

    /// A structurally valid token whose subject no longer exists. Still a
    /// 401, not a 404: the route itself was found.
    #[error("User not found")]
    UnknownTokenUser,

    #[error("Please verify your email to access this resource")]
    UnverifiedAccess,

    #[error("Failed to send verification email")]
    DeliveryFailed(#[source] patchboard_mailer::MailerError),

    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::EmailTaken
            | Self::AlreadyVerified
            | Self::NoPendingOtp
            | Self::OtpExpired
            | Self::OtpMismatch => StatusCode::BAD_REQUEST,

            Self::UserNotFound => StatusCode::NOT_FOUND,

            Self::InvalidCredentials
            | Self::UnverifiedEmail
            | Self::MissingToken
            | Self::InvalidToken
            | Self::UnknownTokenUser
            | Self::UnverifiedAccess => StatusCode::UNAUTHORIZED,

            Self::DeliveryFailed(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal detail goes to the log, never to the client.
        match &self {
            Self::Internal(err) => error!("Unhandled server error: {:#}", err),
            Self::DeliveryFailed(err) => error!("OTP delivery failed: {}", err),
            _ => {}
        }

        let errors = match self {
            Self::Validation(ref fields) => Some(fields.clone()),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            message: self.to_string(),
            errors,
        };

        (self.status_code(), Json(body)).into_response()
    }
}
