use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::models::Coordinate;
use crate::runtime::RuntimeSources;

pub const DEFAULT_CONFIG_PATH: &str = "geopick.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub picker: PickerConfig,
    pub geocoder: GeocoderConfig,
    pub map: MapConfig,
    pub ui: UiConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PickerConfig {
    pub default_center: Coordinate, // Used when no initial position is known
    pub default_zoom: u8,
    pub fly_zoom: u8,
    pub fly_duration_ms: u64,
    pub settle_delay_ms: u64, // Pause before replaying a buffered fly-to
    pub auto_detect: bool,    // Use IP geolocation for the initial position
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String, // Nominatim rejects requests without one
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct MapConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_path: Option<PathBuf>, // Bundled style when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_path: Option<PathBuf>, // Bundled OpenStreetMap layer when absent
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            default_center: Coordinate::new(12.97, 77.59),
            default_zoom: 13,
            fly_zoom: 15,
            fly_duration_ms: 1200,
            settle_delay_ms: 300,
            auto_detect: false,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            timeout_seconds: 10,
            user_agent: concat!("geopick/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { tick_rate_ms: 100 }
    }
}

impl PickerConfig {
    pub fn fly_duration(&self) -> Duration {
        Duration::from_millis(self.fly_duration_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl MapConfig {
    pub fn sources(&self) -> RuntimeSources {
        RuntimeSources {
            style_path: self.style_path.clone(),
            layer_path: self.layer_path.clone(),
        }
    }
}

impl Config {
    /// Loads the config file at `path`.
    /// If it doesn't exist, writes the defaults there and uses them.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    return Config::default();
                }
            }
        }

        let default_config = Config::default();

        // Save default config to disk for the user to edit later
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(path, toml_string).is_err() {
                    warn!("Could not write default {} to disk.", path.display());
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        info!("Loaded default configuration.");
        default_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geopick.toml");

        let config = Config::load(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load(&path), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geopick.toml");
        fs::write(
            &path,
            "[picker]\nfly_zoom = 12\ndefault_center = { lat = 51.5, lng = -0.12 }\n",
        )
        .unwrap();

        let config = Config::load(&path);
        assert_eq!(config.picker.fly_zoom, 12);
        assert_eq!(config.picker.default_center, Coordinate::new(51.5, -0.12));
        assert_eq!(config.picker.default_zoom, 13);
        assert_eq!(config.geocoder, GeocoderConfig::default());
    }

    #[test]
    fn unparsable_file_falls_back_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geopick.toml");
        fs::write(&path, "picker = [not toml").unwrap();

        assert_eq!(Config::load(&path), Config::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "picker = [not toml");
    }
}
