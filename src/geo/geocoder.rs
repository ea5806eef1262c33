//! Geocoding clients.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{GeoPoint, Location};

/// A single address match.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub point: GeoPoint,
    pub formatted_address: String,
}

impl GeocodedAddress {
    pub fn into_location(self) -> Location {
        Location {
            latitude: self.point.latitude,
            longitude: self.point.longitude,
            formatted_address: Some(self.formatted_address),
        }
    }
}

/// Turns a free-form address into coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for `address`, or `None` when the provider has no result.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedAddress>, AppError>;
}

/// Used when no provider is configured. Never resolves anything.
#[derive(Debug, Default, Clone)]
pub struct DisabledGeocoder;

#[async_trait]
impl Geocoder for DisabledGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Option<GeocodedAddress>, AppError> {
        Ok(None)
    }
}

/// Client for a Nominatim-compatible `/search` endpoint.
#[derive(Debug, Clone)]
pub struct HttpGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

impl HttpGeocoder {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bloodbridge-backend/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedAddress>, AppError> {
        let mut query: Vec<(&str, &str)> =
            vec![("q", address), ("format", "jsonv2"), ("limit", "1")];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        let hits: Vec<SearchHit> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let latitude: f64 = hit
            .lat
            .parse()
            .map_err(|_| AppError::Geocoding(format!("Invalid latitude {:?}", hit.lat)))?;
        let longitude: f64 = hit
            .lon
            .parse()
            .map_err(|_| AppError::Geocoding(format!("Invalid longitude {:?}", hit.lon)))?;

        Ok(Some(GeocodedAddress {
            point: GeoPoint::new(latitude, longitude),
            formatted_address: hit.display_name,
        }))
    }
}

/// Fixed lookup table standing in for a provider in tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct StaticGeocoder {
    entries: std::collections::HashMap<String, GeoPoint>,
    fail: bool,
}

#[cfg(test)]
impl StaticGeocoder {
    pub fn failing() -> Self {
        Self {
            entries: Default::default(),
            fail: true,
        }
    }

    pub fn with_entry(mut self, address: &str, point: GeoPoint) -> Self {
        self.entries.insert(address.to_string(), point);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedAddress>, AppError> {
        if self.fail {
            return Err(AppError::Geocoding("provider unavailable".to_string()));
        }
        Ok(self.entries.get(address).map(|point| GeocodedAddress {
            point: *point,
            formatted_address: address.to_string(),
        }))
    }
}
