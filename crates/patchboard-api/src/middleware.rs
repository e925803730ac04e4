use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use patchboard_types::api::Claims;
use patchboard_types::models::PublicUser;

use crate::error::ApiError;
use crate::{AppState, blocking};

/// The identity resolved by the session guard, with the password hash and
/// OTP fields already stripped. Handlers read this from request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

/// Session guard: validate the bearer token, load the acting user, enforce
/// the verified-email gate. A pure gate — rejection is terminal for the
/// request and nothing downstream runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::MissingToken)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::InvalidToken)?;

    let user_id = token_data.claims.sub;
    let db_state = state.clone();
    let row = blocking(move || db_state.db.get_user_by_id(&user_id.to_string()))
        .await?
        .ok_or(ApiError::UnknownTokenUser)?;

    if !row.is_verified {
        return Err(ApiError::UnverifiedAccess);
    }

    let id: Uuid = row
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", row.id, e)))?;

    req.extensions_mut().insert(CurrentUser(PublicUser {
        id,
        name: row.name,
        email: row.email,
        is_verified: row.is_verified,
    }));

    Ok(next.run(req).await)
}
