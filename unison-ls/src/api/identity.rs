//! Voter identity from request headers
//!
//! Clients identify themselves with an opaque `X-Device-ID` header. Only
//! its hash is stored. Request signing happens upstream of this service.

use axum::http::HeaderMap;
use unison_common::db::Voter;
use unison_common::identity::hash_device_id;
use unison_common::time::unix_now;

use crate::db::voters;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Header carrying the raw device identifier
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Maximum accepted raw device identifier length
const MAX_DEVICE_ID_LEN: usize = 256;

/// Extract and hash the device identifier
pub fn device_hash(headers: &HeaderMap) -> ApiResult<String> {
    let raw = headers
        .get(DEVICE_ID_HEADER)
        .ok_or_else(|| ApiError::BadRequest("missing X-Device-ID header".to_string()))?
        .to_str()
        .map_err(|_| ApiError::BadRequest("X-Device-ID must be ASCII".to_string()))?
        .trim();

    if raw.is_empty() || raw.len() > MAX_DEVICE_ID_LEN {
        return Err(ApiError::BadRequest("invalid X-Device-ID header".to_string()));
    }

    Ok(hash_device_id(raw))
}

/// Resolve the calling voter, creating the voter record on first contact
pub async fn resolve_voter(state: &AppState, headers: &HeaderMap) -> ApiResult<Voter> {
    let hash = device_hash(headers)?;
    let voter =
        voters::get_or_create_voter(&state.db, &hash, &state.config.reputation, unix_now()).await?;
    Ok(voter)
}
