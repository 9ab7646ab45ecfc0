use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::LocationFix;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("API error: {0}")]
    ApiError(String),
}

/// Raw feed payload. Call sites of the original feed use two field-naming
/// conventions for coordinates, so both spellings are accepted here and
/// normalized before anything reaches the matcher.
#[derive(Debug, Deserialize)]
struct RawFix {
    #[serde(alias = "latitude")]
    lat: Option<f64>,
    #[serde(alias = "longitude")]
    lng: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    status: Option<bool>,
    #[serde(default, rename = "lastSeen")]
    last_seen: Option<f64>,
}

/// Client for the realtime location feed: latest known fix per vehicle id.
pub struct LocationFeedClient {
    client: Client,
    base_url: String,
}

impl LocationFeedClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| FeedError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetch the latest fix for a vehicle. `Ok(None)` means the feed has no
    /// usable position (absent object or missing coordinates): a no-fix,
    /// not an error.
    pub async fn latest_fix(&self, bus_id: &str) -> Result<Option<LocationFix>, FeedError> {
        let url = format!("{}/{}.json", self.base_url, bus_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FeedError::ApiError(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        let raw: Option<RawFix> =
            serde_json::from_str(&body).map_err(|e| FeedError::ParseError(e.to_string()))?;

        Ok(raw.and_then(normalize))
    }
}

/// Normalize a raw payload into the single `LocationFix` shape, or `None`
/// when coordinates are missing.
fn normalize(raw: RawFix) -> Option<LocationFix> {
    let (lat, lng) = match (raw.lat, raw.lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => return None,
    };

    Some(LocationFix {
        lat,
        lng,
        speed_kmh: raw.speed.unwrap_or(0.0),
        timestamp_epoch_secs: raw.last_seen.unwrap_or(0.0),
        online_flag: raw.status.unwrap_or(false),
    })
}
