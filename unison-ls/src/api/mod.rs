//! HTTP API handlers for unison-ls

pub mod health;
pub mod identity;
pub mod lyrics;
pub mod scores;
pub mod votes;

pub use health::health_routes;
pub use lyrics::lyrics_routes;
pub use scores::score_routes;
pub use votes::vote_routes;

use serde::Serialize;

/// Response envelope for vote, retraction and report endpoints
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(success: bool, message: &str) -> Self {
        Self {
            success,
            message: message.to_string(),
        }
    }
}
