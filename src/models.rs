//! Plain data shared between the picker, the resolver and the UI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components are finite numbers. This is the only check the picker
    /// applies to fly-to input; range validation belongs to the caller.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180].
    pub fn in_range(&self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// `"<lat>, <lng>"` using the shortest exact representation of each value.
    pub fn exact_label(&self) -> String {
        format!("{}, {}", self.lat, self.lng)
    }

    /// `"<lat>, <lng>"` rounded to five decimal places.
    pub fn fixed_label(&self) -> String {
        format!("{:.5}, {:.5}", self.lat, self.lng)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lng)
    }
}

/// Output handed to the caller once per completed selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

/// The single location marker owned by the picker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerState {
    pub position: Coordinate,
    /// Popup text bound to the marker, if any.
    pub popup: Option<String>,
}

/// An externally requested fly-to. The token changes on every request so that
/// repeating the same coordinates still re-triggers the animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyRequest {
    pub coord: Coordinate,
    pub token: u64,
}

/// Where a selection came from. Decides how the fallback address is formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    Click,
    FlyTo,
}

impl SelectionOrigin {
    pub fn fallback_label(self, coord: Coordinate) -> String {
        match self {
            SelectionOrigin::Click => coord.exact_label(),
            SelectionOrigin::FlyTo => coord.fixed_label(),
        }
    }
}

/// The subset of a Nominatim `/reverse` response we care about.
#[derive(Debug, Deserialize)]
pub struct ReverseResponse {
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_label_keeps_full_precision() {
        let c = Coordinate::new(12.971234567, 77.59);
        assert_eq!(c.exact_label(), "12.971234567, 77.59");
    }

    #[test]
    fn fixed_label_rounds_to_five_places() {
        let c = Coordinate::new(12.971234567, -77.5);
        assert_eq!(c.fixed_label(), "12.97123, -77.50000");
    }

    #[test]
    fn range_check_rejects_out_of_bounds_and_nan() {
        assert!(Coordinate::new(90.0, -180.0).in_range());
        assert!(!Coordinate::new(90.1, 0.0).in_range());
        assert!(!Coordinate::new(0.0, 180.5).in_range());
        assert!(!Coordinate::new(f64::NAN, 0.0).in_range());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn fallback_format_depends_on_origin() {
        let c = Coordinate::new(1.123456, 2.0);
        assert_eq!(SelectionOrigin::Click.fallback_label(c), "1.123456, 2");
        assert_eq!(SelectionOrigin::FlyTo.fallback_label(c), "1.12346, 2.00000");
    }

    #[test]
    fn reverse_response_tolerates_missing_field() {
        let r: ReverseResponse = serde_json::from_str(r#"{"error":"Unable to geocode"}"#).unwrap();
        assert!(r.display_name.is_none());
    }
}
