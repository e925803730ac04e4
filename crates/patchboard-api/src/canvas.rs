use axum::{Extension, Json, extract::State};
use tracing::warn;

use patchboard_db::models::BoardRow;
use patchboard_types::api::{BoardResponse, UpdateBoardRequest};
use patchboard_types::events::GatewayEvent;
use patchboard_types::models::{Board, Patch};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, blocking};

/// Fetch the acting user's board, creating an empty one on first access.
pub async fn get_board(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<BoardResponse>, ApiError> {
    let db_state = state.clone();
    let user_id = user.id.to_string();
    let row = blocking(move || db_state.db.get_or_create_board(&user_id)).await?;

    Ok(Json(BoardResponse {
        success: true,
        board: board_from_row(row),
    }))
}

/// Partial update: a present field fully replaces the stored value, an
/// absent one leaves it untouched. The patch sequence is never merged.
/// After persisting, the new state is fanned out to every other live
/// session of the same user; that delivery is best-effort and cannot fail
/// the write.
pub async fn update_board(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<UpdateBoardRequest>,
) -> Result<Json<BoardResponse>, ApiError> {
    let patches_json = match &req.patches {
        Some(patches) => Some(
            serde_json::to_string(patches)
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("patch serialization: {}", e)))?,
        ),
        None => None,
    };

    let db_state = state.clone();
    let user_id = user.id.to_string();
    let image_url = req.image_url.clone();
    let row = blocking(move || {
        db_state
            .db
            .update_board(&user_id, image_url.as_deref(), patches_json.as_deref())
    })
    .await?;

    let board = board_from_row(row);

    state
        .rooms
        .publish(
            user.id,
            GatewayEvent::BoardUpdate {
                image_url: board.image_url.clone(),
                patches: board.patches.clone(),
            },
        )
        .await;

    Ok(Json(BoardResponse {
        success: true,
        board,
    }))
}

fn board_from_row(row: BoardRow) -> Board {
    let patches: Vec<Patch> = serde_json::from_str(&row.patches).unwrap_or_else(|e| {
        warn!("Corrupt patch sequence for board {}: {}", row.user_id, e);
        Vec::new()
    });

    Board {
        image_url: row.image_url,
        patches,
    }
}
