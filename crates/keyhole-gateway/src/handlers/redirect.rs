use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use keyhole_core::ShortCode;

use crate::error::{GatewayError, Result};
use crate::state::AppState;

/// GET /{short_code}: 302 to the long URL.
pub async fn redirect_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let code =
        ShortCode::new(short_code.as_str()).map_err(|_| GatewayError::NotFound(short_code))?;

    let long_url = state.resolver().resolve(&code).await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, long_url)]).into_response())
}
