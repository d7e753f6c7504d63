//! Request path construction.
//!
//! A path is the resource path of an [`Endpoint`] followed by a query string
//! holding exactly one location selector plus the unit, language, mode and
//! key parameters.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use url::form_urlencoded;

use crate::config::{Configuration, FORMAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Current conditions.
    Current,
    /// Default forecast window.
    Forecast,
    /// Daily forecast, `cnt` days.
    ForecastDays(u32),
    /// Hourly forecast, `cnt` hours.
    ForecastHours(u32),
}

impl Endpoint {
    pub fn resource(&self) -> &'static str {
        match self {
            Endpoint::Current => "/data/2.5/weather",
            Endpoint::Forecast => "/data/2.5/forecast",
            Endpoint::ForecastDays(_) => "/data/2.5/forecast/daily",
            Endpoint::ForecastHours(_) => "/data/2.5/forecast/hour",
        }
    }

    fn count(&self) -> Option<u32> {
        match self {
            Endpoint::ForecastDays(n) | Endpoint::ForecastHours(n) => Some(*n),
            Endpoint::Current | Endpoint::Forecast => None,
        }
    }
}

/// The single parameter set identifying the queried place.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSelector<'a> {
    Zip(&'a str),
    CityId(u64),
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl<'a> LocationSelector<'a> {
    /// Pick the selector for `cfg`.
    ///
    /// Precedence: zip, city id, explicitly set city, coordinates, and the
    /// default city last.
    pub fn resolve(cfg: &'a Configuration) -> Self {
        if let Some(zip) = cfg.zip.as_deref() {
            return LocationSelector::Zip(zip);
        }
        if let Some(id) = cfg.city_id {
            return LocationSelector::CityId(id.0);
        }
        if let Some(city) = cfg.city.as_deref() {
            return LocationSelector::City(decode_city(city));
        }
        if let (Some(lat), Some(lon)) = (cfg.latitude, cfg.longitude) {
            return LocationSelector::Coordinates { lat, lon };
        }
        LocationSelector::City(decode_city(cfg.effective_city()))
    }

    fn append_to(&self, query: &mut form_urlencoded::Serializer<'_, String>) {
        match self {
            LocationSelector::Zip(zip) => {
                query.append_pair("zip", zip);
            }
            LocationSelector::CityId(id) => {
                query.append_pair("id", &id.to_string());
            }
            LocationSelector::City(city) => {
                query.append_pair("q", city);
            }
            LocationSelector::Coordinates { lat, lon } => {
                query.append_pair("lat", &lat.to_string());
                query.append_pair("lon", &lon.to_string());
            }
        }
    }
}

/// Characters left as-is in a stored city, the URI component set:
/// alphanumerics plus `- _ . ! ~ * ' ( )`.
const CITY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a city name as a URI component.
pub(crate) fn encode_city(city: &str) -> String {
    utf8_percent_encode(city, CITY_COMPONENT).to_string()
}

/// Stored cities are percent-encoded; undo that so the query serializer
/// encodes them exactly once.
fn decode_city(city: &str) -> String {
    percent_decode_str(city).decode_utf8_lossy().into_owned()
}

/// Build `<resource>?<query>` for `endpoint` from `cfg`.
pub fn build_path(cfg: &Configuration, endpoint: Endpoint) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());

    LocationSelector::resolve(cfg).append_to(&mut query);
    if let Some(cnt) = endpoint.count() {
        query.append_pair("cnt", &cnt.to_string());
    }
    query
        .append_pair("units", &cfg.units)
        .append_pair("lang", &cfg.lan)
        .append_pair("mode", FORMAT)
        .append_pair("APPID", cfg.app_id.as_deref().unwrap_or_default());

    format!("{}?{}", endpoint.resource(), query.finish())
}

/// Path of the deliberately invalid diagnostic resource.
pub(crate) fn crash_path() -> String {
    "/timetocrash".to_string()
}
