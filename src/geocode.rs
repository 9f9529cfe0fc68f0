//! Reverse geocoding: coordinate in, human readable address out.
//!
//! [`NominatimClient`] talks to the OpenStreetMap Nominatim `/reverse`
//! endpoint. [`Resolver`] wraps any [`ReverseGeocoder`] and never fails: a
//! lookup that errors or comes back empty turns into a coordinate label.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;
use crate::models::{Coordinate, ReverseResponse, SelectionOrigin};

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geocoder answered with status {0}")]
    Status(StatusCode),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` when the service has no address for this point.
    async fn reverse(&self, coord: Coordinate) -> Result<Option<String>, GeocodeError>;
}

pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn reverse_url(&self, coord: Coordinate) -> String {
        format!(
            "{}/reverse?format=json&lat={}&lon={}",
            self.base_url, coord.lat, coord.lng
        )
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, coord: Coordinate) -> Result<Option<String>, GeocodeError> {
        let url = self.reverse_url(coord);
        debug!("GET {}", url);

        let res = self.client.get(&url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }
        let body = res.text().await?;
        address_from_body(&body)
    }
}

/// Pulls a usable `display_name` out of a Nominatim JSON body.
pub fn address_from_body(body: &str) -> Result<Option<String>, GeocodeError> {
    let parsed: ReverseResponse = serde_json::from_str(body)?;
    Ok(parsed
        .display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty()))
}

/// Outcome of a resolution. Always carries non-empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Resolved(String),
    Fallback(String),
}

impl Address {
    pub fn text(&self) -> &str {
        match self {
            Address::Resolved(s) | Address::Fallback(s) => s,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Address::Resolved(_))
    }

    pub fn into_string(self) -> String {
        match self {
            Address::Resolved(s) | Address::Fallback(s) => s,
        }
    }
}

/// One attempt per coordinate; errors are absorbed into the fallback label.
#[derive(Clone)]
pub struct Resolver {
    geocoder: Arc<dyn ReverseGeocoder>,
}

impl Resolver {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self { geocoder }
    }

    pub async fn resolve(&self, coord: Coordinate, origin: SelectionOrigin) -> Address {
        match self.geocoder.reverse(coord).await {
            Ok(Some(name)) => Address::Resolved(name),
            Ok(None) => {
                debug!("No address for {}, using coordinates", coord);
                Address::Fallback(origin.fallback_label(coord))
            }
            Err(e) => {
                warn!("Reverse geocode for {} failed: {}. Using coordinates.", coord, e);
                Address::Fallback(origin.fallback_label(coord))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Fixed {
        Answer(Option<String>),
        Malformed,
    }

    #[async_trait]
    impl ReverseGeocoder for Fixed {
        async fn reverse(&self, _: Coordinate) -> Result<Option<String>, GeocodeError> {
            match self {
                Fixed::Answer(v) => Ok(v.clone()),
                Fixed::Malformed => Err(GeocodeError::Decode(
                    serde_json::from_str::<ReverseResponse>("not json").unwrap_err(),
                )),
            }
        }
    }

    fn resolver(fixed: Fixed) -> Resolver {
        Resolver::new(Arc::new(fixed))
    }

    #[test]
    fn body_parsing() {
        assert_eq!(
            address_from_body(r#"{"display_name":"MG Road, Bengaluru"}"#).unwrap(),
            Some("MG Road, Bengaluru".to_string())
        );
        assert_eq!(address_from_body(r#"{"display_name":"  "}"#).unwrap(), None);
        assert_eq!(address_from_body(r#"{"error":"Unable to geocode"}"#).unwrap(), None);
        assert!(address_from_body("<html>").is_err());
    }

    #[test]
    fn reverse_url_uses_lon_parameter() {
        let client = NominatimClient::new(&GeocoderConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..GeocoderConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.reverse_url(Coordinate::new(12.97, 77.59)),
            "http://localhost:8080/reverse?format=json&lat=12.97&lon=77.59"
        );
    }

    #[tokio::test]
    async fn resolved_name_is_passed_through() {
        let r = resolver(Fixed::Answer(Some("MG Road, Bengaluru".to_string())));
        let addr = r.resolve(Coordinate::new(12.97, 77.59), SelectionOrigin::Click).await;
        assert_eq!(addr, Address::Resolved("MG Road, Bengaluru".to_string()));
    }

    #[tokio::test]
    async fn click_fallback_uses_exact_coordinates() {
        let r = resolver(Fixed::Malformed);
        let addr = r.resolve(Coordinate::new(12.971234567, 77.59), SelectionOrigin::Click).await;
        assert_eq!(addr, Address::Fallback("12.971234567, 77.59".to_string()));
    }

    #[tokio::test]
    async fn fly_to_fallback_rounds_coordinates() {
        let r = resolver(Fixed::Answer(None));
        let addr = r.resolve(Coordinate::new(12.971234567, 77.59), SelectionOrigin::FlyTo).await;
        assert_eq!(addr.text(), "12.97123, 77.59000");
        assert!(!addr.is_resolved());
    }
}
