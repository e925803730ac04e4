//! OTP issuance and out-of-band delivery.
//!
//! The `Notifier` trait is the seam the auth service talks through; the SMTP
//! implementation is the production transport and tests substitute fakes.

pub mod otp;
pub mod smtp;
pub mod templates;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Delivers a one-time code to the user out-of-band. Delivery failure is
/// reported, never panicked on: the caller decides whether the surrounding
/// operation survives it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailerError>;
}
