//! Coordinate entry: the text fields next to the map.
//!
//! Range validation happens here, before anything reaches the picker. Each
//! accepted submission gets a fresh token so re-submitting the same values
//! still moves the map.

use thiserror::Error;

use crate::models::{Coordinate, FlyRequest, SelectionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Latitude,
    Longitude,
}

impl Field {
    pub fn toggle(self) -> Self {
        match self {
            Field::Latitude => Field::Longitude,
            Field::Longitude => Field::Latitude,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("latitude must be a number between -90 and 90")]
    Latitude,
    #[error("longitude must be a number between -180 and 180")]
    Longitude,
}

#[derive(Debug, Clone)]
pub struct CoordinateForm {
    pub lat: String,
    pub lng: String,
    pub focus: Field,
    next_token: u64,
    pinned: Option<SelectionResult>,
}

impl Default for CoordinateForm {
    fn default() -> Self {
        Self {
            lat: String::new(),
            lng: String::new(),
            focus: Field::Latitude,
            next_token: 1,
            pinned: None,
        }
    }
}

impl CoordinateForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Latitude => &mut self.lat,
            Field::Longitude => &mut self.lng,
        }
    }

    /// Accepts characters that can appear in a decimal number.
    pub fn push(&mut self, c: char) {
        if c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E') {
            self.focused_mut().push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
    }

    pub fn next_field(&mut self) {
        self.focus = self.focus.toggle();
    }

    /// Validates both fields and produces a fly-to request on success.
    pub fn submit(&mut self) -> Result<FlyRequest, FormError> {
        let lat = parse_in(&self.lat, 90.0).ok_or(FormError::Latitude)?;
        let lng = parse_in(&self.lng, 180.0).ok_or(FormError::Longitude)?;

        let token = self.next_token;
        self.next_token += 1;
        Ok(FlyRequest {
            coord: Coordinate::new(lat, lng),
            token,
        })
    }

    /// Mirrors a picked location back into the fields.
    pub fn apply_selection(&mut self, selection: &SelectionResult) {
        self.lat = format!("{:.6}", selection.lat);
        self.lng = format!("{:.6}", selection.lng);
        self.pinned = Some(selection.clone());
    }

    pub fn pinned(&self) -> Option<&SelectionResult> {
        self.pinned.as_ref()
    }

    pub fn pinned_banner(&self) -> Option<String> {
        self.pinned
            .as_ref()
            .map(|p| format!("Location pinned: {:.4}, {:.4}", p.lat, p.lng))
    }
}

fn parse_in(text: &str, limit: f64) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && (-limit..=limit).contains(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(lat: &str, lng: &str) -> CoordinateForm {
        CoordinateForm {
            lat: lat.to_string(),
            lng: lng.to_string(),
            ..CoordinateForm::default()
        }
    }

    #[test]
    fn valid_submission_yields_fresh_tokens() {
        let mut f = form("12.97", "77.59");
        let first = f.submit().unwrap();
        let second = f.submit().unwrap();
        assert_eq!(first.coord, Coordinate::new(12.97, 77.59));
        assert_eq!(first.coord, second.coord);
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn out_of_range_and_garbage_are_rejected() {
        assert_eq!(form("91", "0").submit(), Err(FormError::Latitude));
        assert_eq!(form("-90", "180.01").submit(), Err(FormError::Longitude));
        assert_eq!(form("", "0").submit(), Err(FormError::Latitude));
        assert_eq!(form("NaN", "0").submit(), Err(FormError::Latitude));
        assert!(form("-90", "-180").submit().is_ok());
    }

    #[test]
    fn typing_goes_to_the_focused_field() {
        let mut f = CoordinateForm::new();
        for c in "12.5x".chars() {
            f.push(c);
        }
        f.next_field();
        f.push('-');
        f.push('3');
        f.backspace();
        assert_eq!(f.lat, "12.5");
        assert_eq!(f.lng, "-");
    }

    #[test]
    fn selection_fills_fields_and_banner() {
        let mut f = CoordinateForm::new();
        f.apply_selection(&SelectionResult {
            lat: 12.97,
            lng: 77.59,
            address: "MG Road, Bengaluru".to_string(),
        });
        assert_eq!(f.lat, "12.970000");
        assert_eq!(f.lng, "77.590000");
        assert_eq!(
            f.pinned_banner().as_deref(),
            Some("Location pinned: 12.9700, 77.5900")
        );
        assert_eq!(f.pinned().unwrap().address, "MG Road, Bengaluru");
    }
}
