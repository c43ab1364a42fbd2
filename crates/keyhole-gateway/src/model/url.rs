use jiff::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUrlRequest {
    pub long_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUrlResponse {
    pub short_code: String,
    pub short_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkCreateUrlRequest {
    pub long_urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUrlEntry {
    pub long_url: String,
    pub short_code: String,
    pub short_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkCreateUrlResponse {
    pub urls: Vec<BulkUrlEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub long_url: String,
    pub short_code: String,
    pub short_url: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub urls: Vec<HistoryEntry>,
}
