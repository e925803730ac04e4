use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;
use uuid::Uuid;

use patchboard_db::models::UserRow;
use patchboard_mailer::otp::{generate_otp, otp_expiry};
use patchboard_types::api::{
    AuthResponse, Claims, LoginRequest, MessageResponse, ProfileResponse, RegisterRequest,
    RegisterResponse, ResendOtpRequest, VerifyEmailRequest,
};
use patchboard_types::models::PublicUser;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, blocking, validate};

/// Session tokens are valid for 30 days from issuance. Stateless: the only
/// invalidation is client-side discard or natural expiry.
const TOKEN_LIFETIME_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    validate::registration(&req)?;
    let email = validate::normalize_email(&req.email);

    let lookup_email = email.clone();
    let db_state = state.clone();
    if blocking(move || db_state.db.get_user_by_email(&lookup_email))
        .await?
        .is_some()
    {
        return Err(ApiError::EmailTaken);
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let otp = generate_otp();
    let expires_at = otp_expiry(state.otp_ttl_minutes).to_rfc3339();

    let db_state = state.clone();
    let name = req.name.trim().to_string();
    let created = {
        let (name, email, otp) = (name.clone(), email.clone(), otp.clone());
        blocking(move || {
            db_state.db.create_user(
                &user_id.to_string(),
                &name,
                &email,
                &password_hash,
                &otp,
                &expires_at,
            )
        })
        .await?
    };
    // A concurrent registration can slip past the pre-check; the UNIQUE
    // constraint on email is the arbiter.
    if !created {
        return Err(ApiError::EmailTaken);
    }

    // The account is persisted either way; a failed send leaves it
    // unverified and waiting for a resend.
    state
        .mailer
        .send_otp(&email, &otp)
        .await
        .map_err(ApiError::DeliveryFailed)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Registration successful. Please check your email for verification OTP."
                .to_string(),
            user: PublicUser {
                id: user_id,
                name,
                email,
                is_verified: false,
            },
        }),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate::email_verification(&req)?;
    let email = validate::normalize_email(&req.email);

    let db_state = state.clone();
    let lookup_email = email.clone();
    let user = blocking(move || db_state.db.get_user_by_email(&lookup_email))
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if user.is_verified {
        return Err(ApiError::AlreadyVerified);
    }

    // Ordering matters: existence, then expiry, then equality.
    let (code, expires_at) = match (&user.otp_code, &user.otp_expires_at) {
        (Some(code), Some(expires_at)) => (code.clone(), expires_at.clone()),
        _ => return Err(ApiError::NoPendingOtp),
    };

    let expires_at: DateTime<Utc> = expires_at
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt otp expiry: {}", e)))?;
    if Utc::now() >= expires_at {
        return Err(ApiError::OtpExpired);
    }

    if code != req.otp {
        return Err(ApiError::OtpMismatch);
    }

    let db_state = state.clone();
    let user_id = user.id.clone();
    blocking(move || db_state.db.mark_verified(&user_id)).await?;

    let token = create_token(&state.jwt_secret, &user.id)?;

    Ok(Json(AuthResponse {
        success: true,
        token,
        user: public_projection(&user, true)?,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate::login(&req)?;
    let email = validate::normalize_email(&req.email);

    // Unknown email and wrong password produce the same outcome so the
    // login surface cannot be used to enumerate accounts.
    let db_state = state.clone();
    let lookup_email = email.clone();
    let user = blocking(move || db_state.db.get_user_by_email(&lookup_email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {}", e)))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    if !user.is_verified {
        // Credentials are good but the email never got confirmed: issue a
        // fresh OTP (invalidating any previous code) and refuse the login.
        let otp = generate_otp();
        let expires_at = otp_expiry(state.otp_ttl_minutes).to_rfc3339();

        let db_state = state.clone();
        let user_id = user.id.clone();
        let code = otp.clone();
        blocking(move || db_state.db.set_otp(&user_id, &code, &expires_at)).await?;

        if let Err(e) = state.mailer.send_otp(&email, &otp).await {
            warn!("OTP delivery on unverified login failed for {}: {}", email, e);
        }

        return Err(ApiError::UnverifiedEmail);
    }

    let token = create_token(&state.jwt_secret, &user.id)?;

    Ok(Json(AuthResponse {
        success: true,
        token,
        user: public_projection(&user, true)?,
    }))
}

pub async fn resend_otp(
    State(state): State<AppState>,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate::resend_otp(&req)?;
    let email = validate::normalize_email(&req.email);

    let db_state = state.clone();
    let lookup_email = email.clone();
    let user = blocking(move || db_state.db.get_user_by_email(&lookup_email))
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if user.is_verified {
        return Err(ApiError::AlreadyVerified);
    }

    let otp = generate_otp();
    let expires_at = otp_expiry(state.otp_ttl_minutes).to_rfc3339();

    let db_state = state.clone();
    let user_id = user.id.clone();
    let code = otp.clone();
    blocking(move || db_state.db.set_otp(&user_id, &code, &expires_at)).await?;

    state
        .mailer
        .send_otp(&email, &otp)
        .await
        .map_err(ApiError::DeliveryFailed)?;

    Ok(Json(MessageResponse {
        success: true,
        message: "OTP sent successfully. Please check your email.".to_string(),
    }))
}

/// The session guard already resolved and stripped the acting user.
pub async fn me(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        success: true,
        user,
    })
}

pub fn create_token(secret: &str, user_id: &str) -> Result<String, ApiError> {
    let sub: Uuid = user_id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", user_id, e)))?;

    let claims = Claims {
        sub,
        exp: (Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(token)
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();
    Ok(hash)
}

fn public_projection(user: &UserRow, is_verified: bool) -> Result<PublicUser, ApiError> {
    let id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", user.id, e)))?;
    Ok(PublicUser {
        id,
        name: user.name.clone(),
        email: user.email.clone(),
        is_verified,
    })
}
