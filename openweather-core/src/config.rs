use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, fs, path::Path, str::FromStr};

use crate::error::Error;

pub const DEFAULT_HOST: &str = "api.openweathermap.org";
pub const DEFAULT_CITY: &str = "fairplay";
pub const DEFAULT_UNITS: &str = "metric";
pub const DEFAULT_LANG: &str = "en";
pub const FORMAT: &str = "json";
pub const DEFAULT_RETRIES: u32 = 3;

/// Numeric OpenWeatherMap city identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CityId(pub u64);

impl From<u64> for CityId {
    fn from(id: u64) -> Self {
        CityId(id)
    }
}

impl From<u32> for CityId {
    fn from(id: u32) -> Self {
        CityId(u64::from(id))
    }
}

impl FromStr for CityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(CityId)
            .map_err(|_| Error::InvalidCityId(s.to_string()))
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for CityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Ok(CityId(id)),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Request settings shared by every call a client makes.
///
/// Field names on the wire follow the OpenWeatherMap client convention, so a
/// document like
///
/// ```toml
/// cityId = 4367872
/// units = "imperial"
/// lan = "it"
/// APPID = "..."
/// ssl = true
/// keepAlive = 30000
/// ```
///
/// deserializes directly. Omitted fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Configuration {
    /// Explicitly chosen city. `set_city` stores it lower-cased and
    /// percent-encoded; values given at construction are kept as-is.
    /// `None` means the default city, which loses to coordinates.
    pub city: Option<String>,
    pub city_id: Option<CityId>,
    pub zip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub units: String,
    pub lan: String,
    pub format: String,
    #[serde(rename = "APPID")]
    pub app_id: Option<String>,
    pub ssl: bool,
    /// Idle connection lifetime in milliseconds. `None` disables pooling.
    pub keep_alive: Option<u64>,
    pub host: String,
    /// Maximum attempts for one logical request.
    pub retries: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            city: None,
            city_id: None,
            zip: None,
            latitude: None,
            longitude: None,
            units: DEFAULT_UNITS.to_string(),
            lan: DEFAULT_LANG.to_string(),
            format: FORMAT.to_string(),
            app_id: None,
            ssl: false,
            keep_alive: None,
            host: DEFAULT_HOST.to_string(),
            retries: DEFAULT_RETRIES,
        }
    }
}

impl Configuration {
    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Configuration =
            toml::from_str(contents).context("Failed to parse OpenWeatherMap configuration")?;
        Ok(cfg)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Configuration = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "loaded OpenWeatherMap configuration");
        Ok(cfg)
    }

    /// City used for `q=` when no other selector wins.
    pub fn effective_city(&self) -> &str {
        self.city.as_deref().unwrap_or(DEFAULT_CITY)
    }
}
