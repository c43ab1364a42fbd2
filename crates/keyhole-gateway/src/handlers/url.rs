use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use tracing::debug;

use super::owner_from_headers;
use crate::error::{GatewayError, Result};
use crate::model::{
    BulkCreateUrlRequest, BulkCreateUrlResponse, BulkUrlEntry, CreateUrlRequest,
    CreateUrlResponse, HistoryEntry, HistoryResponse,
};
use crate::state::AppState;
use crate::validate::{validate_bulk, validate_url};

pub async fn create_url_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateUrlRequest>,
) -> Result<Json<CreateUrlResponse>> {
    validate_url(&request.long_url)?;
    let owner = owner_from_headers(&headers)?;

    let code = state
        .resolver()
        .create_short_code(&request.long_url, owner)
        .await?;
    debug!(code = %code, "created short url");

    Ok(Json(CreateUrlResponse {
        short_url: state.short_url(&code),
        short_code: code.into(),
    }))
}

pub async fn bulk_create_url_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkCreateUrlRequest>,
) -> Result<Json<BulkCreateUrlResponse>> {
    validate_bulk(&request.long_urls)?;
    let owner = owner_from_headers(&headers)?;

    let codes = state
        .resolver()
        .create_short_codes(&request.long_urls, owner)
        .await?;

    let urls = codes
        .into_iter()
        .map(|entry| BulkUrlEntry {
            short_url: state.short_url(&entry.short_code),
            short_code: entry.short_code.into(),
            long_url: entry.long_url,
        })
        .collect();

    Ok(Json(BulkCreateUrlResponse { urls }))
}

pub async fn history_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>> {
    let owner = owner_from_headers(&headers)?.ok_or(GatewayError::MissingOwner)?;

    let records = state.resolver().get_history_by_owner(owner).await?;

    let urls = records
        .into_iter()
        .map(|record| HistoryEntry {
            short_url: state.short_url(&record.short_code),
            short_code: record.short_code.into(),
            long_url: record.long_url,
            created_at: record.created_at,
        })
        .collect();

    Ok(Json(HistoryResponse { urls }))
}
