//! Persistent application configuration model and defaults.

use std::path::PathBuf;

/// Root configuration persisted to `tunetree.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Library content preferences.
    pub library: LibraryConfig,
    #[serde(default)]
    /// List thumbnail rendering preferences.
    pub thumbnails: ThumbnailConfig,
    #[serde(default)]
    /// Internal message bus tuning.
    pub bus: BusConfig,
}

/// Library content preferences persisted between sessions.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub folders: Vec<PathBuf>,
}

/// List thumbnail rendering preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_list_image_max_edge_px")]
    pub list_image_max_edge_px: u32,
}

/// Internal message bus tuning.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            list_image_max_edge_px: default_list_image_max_edge_px(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

fn default_list_image_max_edge_px() -> u32 {
    320
}

fn default_bus_capacity() -> usize {
    1_024
}

/// Clamps hand-edited values into ranges the pipelines can work with.
pub fn sanitize_config(config: Config) -> Config {
    let clamped_max_edge = config.thumbnails.list_image_max_edge_px.clamp(16, 1_024);
    let clamped_capacity = config.bus.capacity.clamp(64, 65_536);

    Config {
        library: config.library,
        thumbnails: ThumbnailConfig {
            list_image_max_edge_px: clamped_max_edge,
        },
        bus: BusConfig {
            capacity: clamped_capacity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{sanitize_config, BusConfig, Config, ThumbnailConfig};

    #[test]
    fn test_default_config_has_expected_values() {
        let config = Config::default();

        assert!(config.library.folders.is_empty());
        assert_eq!(config.thumbnails.list_image_max_edge_px, 320);
        assert_eq!(config.bus.capacity, 1_024);
    }

    #[test]
    fn test_partial_config_deserialization_fills_defaults() {
        let partial_config_toml = r#"
[library]
folders = ["/home/user/Music"]
"#;

        let parsed: Config = toml::from_str(partial_config_toml).expect("config should parse");
        assert_eq!(parsed.library.folders.len(), 1);
        assert_eq!(parsed.thumbnails.list_image_max_edge_px, 320);
        assert_eq!(parsed.bus.capacity, 1_024);
    }

    #[test]
    fn test_sanitize_config_clamps_out_of_range_values() {
        let input = Config {
            thumbnails: ThumbnailConfig {
                list_image_max_edge_px: 9_999,
            },
            bus: BusConfig { capacity: 2 },
            ..Config::default()
        };

        let sanitized = sanitize_config(input);
        assert_eq!(sanitized.thumbnails.list_image_max_edge_px, 1_024);
        assert_eq!(sanitized.bus.capacity, 64);
    }

    #[test]
    fn test_sanitize_config_keeps_in_range_values() {
        let input = Config {
            thumbnails: ThumbnailConfig {
                list_image_max_edge_px: 128,
            },
            bus: BusConfig { capacity: 512 },
            ..Config::default()
        };

        let sanitized = sanitize_config(input.clone());
        assert_eq!(sanitized, input);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config_text =
            toml::to_string(&Config::default()).expect("default config should serialize");
        let parsed: Config = toml::from_str(&config_text).expect("config should parse back");
        assert_eq!(parsed, Config::default());
    }
}
