//! Commute lookup against the Google Directions API.
//!
//! The engine only needs two facts per evaluation: the route summary and
//! the duration-in-traffic for a departure of "now". The trait keeps the
//! lookup mockable; the REST implementation takes an injectable base URL
//! so tests can point it at a local mock server.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DirectionsError;

/// Current route summary and live traffic duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEstimate {
    /// Free-text route summary (e.g. "I-5 N").
    pub summary: String,
    /// Duration in traffic, rounded to whole minutes.
    pub duration_in_traffic_minutes: u32,
}

/// Commute lookup collaborator.
#[async_trait]
pub trait DirectionsClient: Send + Sync {
    /// Current best route from `origin` to `destination`, departing now.
    /// Failure is an error, never a partial result.
    async fn route(&self, origin: &str, destination: &str)
        -> Result<RouteEstimate, DirectionsError>;
}

const GOOGLE_MAPS_BASE_URL: &str = "https://maps.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Google Directions REST client.
pub struct GoogleDirectionsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleDirectionsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GOOGLE_MAPS_BASE_URL)
    }

    /// Point the client at a different host (tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DirectionsClient for GoogleDirectionsClient {
    async fn route(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<RouteEstimate, DirectionsError> {
        let url = format!("{}/maps/api/directions/json", self.base_url);
        let response: Value = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("origin", origin),
                ("destination", destination),
                ("departure_time", "now"),
                ("key", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_directions(&response, origin, destination)
    }
}

/// Extract the first route's summary and traffic duration.
fn parse_directions(
    response: &Value,
    origin: &str,
    destination: &str,
) -> Result<RouteEstimate, DirectionsError> {
    let status = response["status"].as_str().unwrap_or("MISSING_STATUS");
    match status {
        "OK" => {}
        "ZERO_RESULTS" | "NOT_FOUND" => {
            return Err(DirectionsError::NoRoute {
                origin: origin.to_string(),
                destination: destination.to_string(),
            })
        }
        other => {
            return Err(DirectionsError::ServiceStatus {
                status: other.to_string(),
            })
        }
    }

    let route = &response["routes"][0];
    let summary = route["summary"]
        .as_str()
        .ok_or_else(|| DirectionsError::MalformedResponse("routes[0].summary missing".into()))?;
    let seconds = route["legs"][0]["duration_in_traffic"]["value"]
        .as_i64()
        .ok_or_else(|| {
            DirectionsError::MalformedResponse(
                "routes[0].legs[0].duration_in_traffic.value missing".into(),
            )
        })?;

    let minutes = ((seconds.max(0) as f64) / 60.0).round() as u32;
    Ok(RouteEstimate {
        summary: summary.to_string(),
        duration_in_traffic_minutes: minutes,
    })
}
