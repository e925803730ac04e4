use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public projection of a user account. Never carries the password hash
/// or any pending OTP state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_verified: bool,
}

/// A rectangular overlay region on the canvas board.
///
/// Position and size are percentages of the container (0-100), opacity is
/// in [0,1]. The server only type-checks these; out-of-range values are
/// stored as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Client-generated unique id.
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub color: String,
    pub opacity: f64,
}

/// One canvas board per user: an image reference plus an ordered patch
/// sequence. The patch sequence is always replaced wholesale on update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub image_url: String,
    pub patches: Vec<Patch>,
}
