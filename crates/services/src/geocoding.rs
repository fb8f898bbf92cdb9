use std::time::Duration;

use foodshare_config::GeocodingSettings;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAddress {
    pub address: String,
    /// False when the lookup failed and `address` is the raw coordinate pair.
    pub resolved: bool,
}

/// Reverse geocoding against a Nominatim-compatible endpoint.
pub struct GeocodingService {
    client: reqwest::Client,
    settings: GeocodingSettings,
}

impl GeocodingService {
    pub fn new(settings: GeocodingSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }

    /// Human-readable address for a point. Never fails: any lookup problem
    /// yields the coordinates formatted to six decimals.
    pub async fn reverse(&self, lat: f64, lon: f64) -> ResolvedAddress {
        if !self.settings.enabled {
            return coordinates_only(lat, lon);
        }
        match self.lookup(lat, lon).await {
            Ok(Some(address)) => ResolvedAddress {
                address,
                resolved: true,
            },
            Ok(None) => coordinates_only(lat, lon),
            Err(e) => {
                warn!(lat, lon, error = %e, "reverse geocoding failed");
                coordinates_only(lat, lon)
            }
        }
    }

    async fn lookup(&self, lat: f64, lon: f64) -> anyhow::Result<Option<String>> {
        let resp = self
            .client
            .get(&self.settings.reverse_url)
            .query(&[("format", "json")])
            .query(&[("lat", lat), ("lon", lon)])
            .send()
            .await?
            .error_for_status()?
            .json::<ReverseResponse>()
            .await?;
        Ok(resp.display_name.filter(|name| !name.trim().is_empty()))
    }
}

pub fn format_coordinates(lat: f64, lon: f64) -> String {
    format!("{lat:.6}, {lon:.6}")
}

fn coordinates_only(lat: f64, lon: f64) -> ResolvedAddress {
    ResolvedAddress {
        address: format_coordinates(lat, lon),
        resolved: false,
    }
}
