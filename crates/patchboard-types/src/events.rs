use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Patch;

/// Events pushed to clients over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful identification.
    Ready { user_id: Uuid },

    /// The board changed in another session of the same user. Carries the
    /// full new state; receivers replace rather than merge.
    BoardUpdate {
        image_url: String,
        patches: Vec<Patch>,
    },
}

/// Commands sent from client to server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the connection. Must be the first frame; the server
    /// joins the session to the room named by the token's user id.
    Identify { token: String },
}
