pub mod auth;
pub mod canvas;
pub mod error;
pub mod middleware;
pub mod validate;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use patchboard_db::Database;
use patchboard_gateway::rooms::Rooms;
use patchboard_mailer::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub rooms: Rooms,
    pub mailer: Arc<dyn Notifier>,
    pub jwt_secret: String,
    pub otp_ttl_minutes: i64,
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, error::ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {}", e);
            error::ApiError::Internal(e.into())
        })?
        .map_err(error::ApiError::Internal)
}
