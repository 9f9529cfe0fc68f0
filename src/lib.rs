//! geopick: pick a location on a terminal map.
//!
//! Click the map, or enter coordinates to fly there, and the point is reverse
//! geocoded into an address. See [`picker::LocationPicker`] for the lifecycle.

pub mod app;
pub mod config;
pub mod events;
pub mod form;
pub mod geocode;
pub mod location;
pub mod logging;
pub mod models;
pub mod picker;
pub mod runtime;
pub mod ui;
pub mod viewport;
