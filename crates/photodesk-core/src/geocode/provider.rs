//! Reverse geocoder trait and the Mapbox implementation.

use crate::config::GeocodeConfig;
use crate::error::GeocodeError;
use crate::types::GeocodedPlace;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Turns a coordinate pair into a human-readable place.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Look up a coordinate. `Ok(None)` means the provider had no match.
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<GeocodedPlace>, GeocodeError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Mapbox Geocoding v6 reverse lookups.
pub struct MapboxGeocoder {
    endpoint: String,
    token: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl MapboxGeocoder {
    pub fn new(endpoint: &str, token: &str, timeout_ms: u64) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            token: token.to_string(),
            timeout: Duration::from_millis(timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    /// Build from config. Returns `None` when geocoding is disabled or no
    /// token is available.
    pub fn from_config(config: &GeocodeConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let token = resolve_env_var(&config.token)?;
        Some(Self::new(&config.endpoint, &token, config.timeout_ms))
    }
}

// --- Response types ---

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Deserialize)]
struct FeatureProperties {
    name: Option<String>,
    #[serde(default)]
    context: FeatureContext,
}

#[derive(Deserialize, Default)]
struct FeatureContext {
    country: Option<ContextEntry>,
    region: Option<ContextEntry>,
    place: Option<ContextEntry>,
}

#[derive(Deserialize)]
struct ContextEntry {
    name: String,
}

/// Extract the first feature of a v6 reverse response.
pub fn parse_response(body: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).map_err(|e| GeocodeError::Parse(e.to_string()))?;

    let Some(feature) = collection.features.into_iter().next() else {
        return Ok(None);
    };
    let props = feature.properties;
    Ok(Some(GeocodedPlace {
        country: props.context.country.map(|c| c.name),
        region: props.context.region.map(|c| c.name),
        city: props.context.place.map(|c| c.name),
        place_name: props.name,
    }))
}

#[async_trait]
impl ReverseGeocoder for MapboxGeocoder {
    fn name(&self) -> &str {
        "mapbox"
    }

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<GeocodedPlace>, GeocodeError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("longitude", longitude.to_string()),
                ("latitude", latitude.to_string()),
                ("limit", "1".to_string()),
            ])
            .header("Authorization", format!("Bearer {}", self.token))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    GeocodeError::Http {
                        message: format!("Mapbox request failed: {e}"),
                        status_code: None,
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GeocodeError::Http {
                message: format!("Mapbox HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body = resp.text().await.map_err(|e| GeocodeError::Http {
            message: format!("Failed to read Mapbox response: {e}"),
            status_code: None,
        })?;
        parse_response(&body)
    }
}
