mod health;
mod metrics;
mod redirect;
mod url;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use redirect::redirect_handler;
pub use url::{bulk_create_url_handler, create_url_handler, history_handler};

use axum::http::HeaderMap;
use keyhole_core::OwnerId;

use crate::error::{GatewayError, Result};

/// Header carrying the authenticated owner, set by the identity layer in
/// front of the gateway.
pub const OWNER_HEADER: &str = "x-keyhole-owner";

/// Reads the optional owner. A present but malformed header is rejected.
fn owner_from_headers(headers: &HeaderMap) -> Result<Option<OwnerId>> {
    let Some(value) = headers.get(OWNER_HEADER) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| GatewayError::InvalidOwner("owner header is not ASCII".to_string()))?;
    value
        .trim()
        .parse::<OwnerId>()
        .map(Some)
        .map_err(|_| GatewayError::InvalidOwner(value.to_string()))
}
