use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::providers::feed::FeedError;

#[derive(Debug, Deserialize)]
struct AvailabilityRecord {
    #[serde(default, rename = "isNotAvailable")]
    is_not_available: bool,
}

/// Client for the bus-availability registry. When a vehicle is marked out of
/// service, the tracker must not start polling for it.
pub struct AvailabilityClient {
    client: Client,
    base_url: String,
}

impl AvailabilityClient {
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

    /// True when the registry marks the vehicle out of service. An absent
    /// record means the vehicle is available.
    pub async fn is_not_available(&self, bus_id: &str) -> Result<bool, FeedError> {
        let url = format!("{}/{}.json", self.base_url, bus_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
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

        let record: Option<AvailabilityRecord> =
            serde_json::from_str(&body).map_err(|e| FeedError::ParseError(e.to_string()))?;

        Ok(record.map(|r| r.is_not_available).unwrap_or(false))
    }
}
