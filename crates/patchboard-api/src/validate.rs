//! Request validation with field-level detail, applied before any handler
//! logic runs. Violations surface as 400 with a per-field error list.

use crate::error::{ApiError, FieldError};
use patchboard_types::api::{LoginRequest, RegisterRequest, ResendOtpRequest, VerifyEmailRequest};

/// Lowercase, trimmed form used for every lookup and insert so the unique
/// index treats `Alice@Example.com` and `alice@example.com` as one address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn check(errors: Vec<FieldError>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

pub fn registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if req.name.trim().is_empty() {
        errors.push(FieldError { field: "name", message: "Name is required" });
    }
    if !looks_like_email(&req.email) {
        errors.push(FieldError { field: "email", message: "Please include a valid email" });
    }
    if req.password.len() < 6 {
        errors.push(FieldError {
            field: "password",
            message: "Password must be at least 6 characters",
        });
    }
    check(errors)
}

pub fn login(req: &LoginRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if !looks_like_email(&req.email) {
        errors.push(FieldError { field: "email", message: "Please include a valid email" });
    }
    if req.password.is_empty() {
        errors.push(FieldError { field: "password", message: "Password is required" });
    }
    check(errors)
}

pub fn email_verification(req: &VerifyEmailRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if !looks_like_email(&req.email) {
        errors.push(FieldError { field: "email", message: "Please include a valid email" });
    }
    if req.otp.len() != 6 || !req.otp.chars().all(|c| c.is_ascii_digit()) {
        errors.push(FieldError { field: "otp", message: "OTP must be 6 digits" });
    }
    check(errors)
}

pub fn resend_otp(req: &ResendOtpRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if !looks_like_email(&req.email) {
        errors.push(FieldError { field: "email", message: "Please include a valid email" });
    }
    check(errors)
}
