//! Initial map position.
//!
//! The picker starts at the caller's initial position when one is known. With
//! `auto_detect` enabled that position comes from IP geolocation; otherwise,
//! or when the lookup fails, the configured default center is used.

use ipgeolocate::{Locator, Service};
use tracing::{error, info};

use crate::config::PickerConfig;
use crate::models::Coordinate;

/// Resolves the position the map should open at.
///
/// Returns `None` when auto detection is off or fails, which tells the picker
/// to fall back to its default center.
pub async fn initial_position(config: &PickerConfig) -> Option<Coordinate> {
    if !config.auto_detect {
        return None;
    }
    detect_position().await
}

/// Approximate position of this machine via the [IpApi](https://ip-api.com/)
/// service. Coordinates that fail to parse or fall outside valid ranges are
/// treated as a failed lookup.
pub async fn detect_position() -> Option<Coordinate> {
    // Empty IP asks the service to locate the caller.
    match Locator::get("", Service::IpApi).await {
        Ok(loc) => {
            let parsed = parse_position(&loc.latitude, &loc.longitude);
            match parsed {
                Some(coord) => info!("Geolocation successful - {}", coord),
                None => error!(
                    "Geolocation returned unusable coordinates ({}, {})",
                    loc.latitude, loc.longitude
                ),
            }
            parsed
        }
        Err(e) => {
            error!("Error using geolocation service: {}. Using default center.", e);
            None
        }
    }
}

fn parse_position(lat: &str, lng: &str) -> Option<Coordinate> {
    let lat = lat.trim().parse::<f64>().ok()?;
    let lng = lng.trim().parse::<f64>().ok()?;
    Some(Coordinate::new(lat, lng)).filter(Coordinate::in_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_strings() {
        assert_eq!(
            parse_position("37.7749", " -122.4194"),
            Some(Coordinate::new(37.7749, -122.4194))
        );
        assert_eq!(parse_position("north", "0"), None);
        assert_eq!(parse_position("91", "0"), None);
    }

    #[tokio::test]
    async fn disabled_detection_yields_none() {
        let config = PickerConfig::default();
        assert!(!config.auto_detect);
        assert_eq!(initial_position(&config).await, None);
    }
}
