use crate::sample::Grouping;

use hyper::Uri;
use serde::Deserialize;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_log_level")]
    pub log_level: log::Level,
    #[serde(default = "Config::default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub samples: SamplesFormat,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "Config::default_feeds")]
    pub feeds: Vec<Feed>,
}

impl Config {
    fn default_log_level() -> log::Level {
        log::Level::Info
    }

    fn default_output_dir() -> PathBuf {
        "gen/latest-feeds".into()
    }

    /// The two satellite ISPs publishing RFC8805 feeds today.
    fn default_feeds() -> Vec<Feed> {
        vec![
            Feed {
                key: "starlink".into(),
                provider: "SpaceX Starlink".into(),
                url: Uri::from_static("https://geoip.starlinkisp.net/feed.csv"),
            },
            Feed {
                key: "viasat".into(),
                provider: "Viasat".into(),
                url: Uri::from_static("https://raw.githubusercontent.com/Viasat/geofeed/main/geofeed.csv"),
            },
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            output_dir: Self::default_output_dir(),
            samples: SamplesFormat::default(),
            api: ApiConfig::default(),
            feeds: Self::default_feeds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feed {
    /// Short unique key; also names the per-provider output subdirectory.
    pub key: String,
    pub provider: String,
    #[serde(with = "http_serde::uri")]
    pub url: Uri,
}

/// Shape of samples.json; also fixes how representatives are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SamplesFormat {
    #[serde(alias = "countries", alias = "flat")]
    Countries,
    #[default]
    #[serde(alias = "geojson", alias = "features")]
    GeoJson,
}

impl SamplesFormat {
    pub fn grouping(self) -> Grouping {
        match self {
            Self::Countries => Grouping::Country,
            Self::GeoJson => Grouping::Location,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "ApiConfig::default_endpoint", with = "http_serde::uri")]
    pub endpoint: Uri,
    #[serde(default = "ApiConfig::default_key_env")]
    pub key_env: String,
    #[serde(default = "ApiConfig::default_timeout_secs")]
    pub timeout_secs: NonZeroU64,
}

impl ApiConfig {
    fn default_endpoint() -> Uri {
        Uri::from_static("https://ep.api.getfastah.com/whereis/v1/json/")
    }

    fn default_key_env() -> String {
        "FASTAH_PRIVATE_API_KEY".into()
    }

    fn default_timeout_secs() -> NonZeroU64 {
        5.try_into().unwrap()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.get())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            key_env: Self::default_key_env(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

pub fn parse_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let toml_string = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&toml_string)?;
    Ok(config)
}
