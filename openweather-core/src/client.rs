use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tracing::instrument;

use crate::{
    config::{CityId, Configuration},
    error::{Error, Result},
    model::{CurrentWeather, SmartWeather},
    query::{self, Endpoint},
    transport::{self, ConnectionPool},
};

/// Latitude/longitude pair as stored on the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// OpenWeatherMap client.
///
/// The configuration is immutable: every `set_*` method returns a new client
/// and leaves the receiver untouched. Clients derived from one another share
/// a connection pool unless the transport settings (`ssl`, keep-alive)
/// change.
///
/// ```no_run
/// # async fn demo() -> openweather_core::Result<()> {
/// use openweather_core::OpenWeatherMap;
///
/// let weather = OpenWeatherMap::new()
///     .set_app_id("my-key")
///     .set_city("Fairplay")
///     .set_lang("it");
///
/// let temp = weather.temperature().await?;
/// # let _ = temp;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenWeatherMap {
    config: Arc<Configuration>,
    pool: ConnectionPool,
}

impl OpenWeatherMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Configuration) -> Self {
        Self {
            config: Arc::new(config),
            pool: ConnectionPool::new(),
        }
    }

    /// Copy of `self` with one configuration change, same connection pool.
    fn derive(&self, change: impl FnOnce(&mut Configuration)) -> Self {
        let mut config = Configuration::clone(&self.config);
        change(&mut config);
        Self {
            config: Arc::new(config),
            pool: self.pool.clone(),
        }
    }

    /// Like [`Self::derive`], but the result gets its own pool when the
    /// transport settings differ from the receiver's.
    fn derive_transport(&self, change: impl FnOnce(&mut Configuration)) -> Self {
        let mut next = self.derive(change);
        if next.config.ssl != self.config.ssl || next.config.keep_alive != self.config.keep_alive {
            next.pool = ConnectionPool::new();
        }
        next
    }

    // Setters

    pub fn set_lang(&self, lang: &str) -> Self {
        let lang = lang.to_lowercase();
        self.derive(|c| c.lan = lang)
    }

    /// Lower-cases and percent-encodes `city`. Other selectors are kept.
    pub fn set_city(&self, city: &str) -> Self {
        let city = query::encode_city(&city.to_lowercase());
        self.derive(|c| c.city = Some(city))
    }

    pub fn set_coordinate(&self, latitude: f64, longitude: f64) -> Self {
        self.derive(|c| {
            c.latitude = Some(latitude);
            c.longitude = Some(longitude);
        })
    }

    /// Numeric strings go through [`CityId`]'s `FromStr`:
    /// `client.set_city_id("4367872".parse::<CityId>()?)`.
    pub fn set_city_id(&self, id: impl Into<CityId>) -> Self {
        let id = id.into();
        self.derive(|c| c.city_id = Some(id))
    }

    pub fn set_zip_code(&self, zip: &str) -> Self {
        let zip = zip.to_string();
        self.derive(|c| c.zip = Some(zip))
    }

    /// Stored lower-cased; not checked against metric/imperial/standard.
    pub fn set_units(&self, units: &str) -> Self {
        let units = units.to_lowercase();
        self.derive(|c| c.units = units)
    }

    pub fn set_app_id(&self, app_id: &str) -> Self {
        let app_id = app_id.to_string();
        self.derive(|c| c.app_id = Some(app_id))
    }

    pub fn set_ssl(&self, enabled: bool) -> Self {
        self.derive_transport(|c| c.ssl = enabled)
    }

    /// `None` turns connection reuse off.
    pub fn set_keep_alive(&self, keep_alive: Option<Duration>) -> Self {
        let ms = keep_alive.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self.derive_transport(|c| c.keep_alive = ms)
    }

    pub fn set_host(&self, host: &str) -> Self {
        let host = host.to_string();
        self.derive(|c| c.host = host)
    }

    /// Attempts per logical request; values below 1 are treated as 1.
    pub fn set_retries(&self, retries: u32) -> Self {
        self.derive(|c| c.retries = retries)
    }

    // Accessors

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn lang(&self) -> &str {
        &self.config.lan
    }

    pub fn city(&self) -> &str {
        self.config.effective_city()
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.config.latitude,
            longitude: self.config.longitude,
        }
    }

    pub fn city_id(&self) -> Option<CityId> {
        self.config.city_id
    }

    pub fn zip_code(&self) -> Option<&str> {
        self.config.zip.as_deref()
    }

    pub fn units(&self) -> &str {
        &self.config.units
    }

    pub fn format(&self) -> &str {
        &self.config.format
    }

    pub fn app_id(&self) -> Option<&str> {
        self.config.app_id.as_deref()
    }

    pub fn ssl(&self) -> bool {
        self.config.ssl
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        self.config.keep_alive.map(Duration::from_millis)
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn retries(&self) -> u32 {
        self.config.retries
    }

    pub fn connection_pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // Paths

    pub fn build_path(&self) -> String {
        query::build_path(&self.config, Endpoint::Current)
    }

    pub fn build_path_forecast(&self) -> String {
        query::build_path(&self.config, Endpoint::Forecast)
    }

    pub fn build_path_forecast_for_days(&self, days: u32) -> String {
        query::build_path(&self.config, Endpoint::ForecastDays(days))
    }

    pub fn build_path_forecast_for_hours(&self, hours: u32) -> String {
        query::build_path(&self.config, Endpoint::ForecastHours(hours))
    }

    // Requests

    /// GET `path` against the configured host and return the parsed body.
    pub async fn get_data(&self, path: &str) -> Result<Value> {
        transport::get_data(&self.pool, &self.config, path).await
    }

    async fn fetch(&self, endpoint: Endpoint) -> Result<Value> {
        self.get_data(&query::build_path(&self.config, endpoint)).await
    }

    pub async fn all_weather(&self) -> Result<Value> {
        self.fetch(Endpoint::Current).await
    }

    pub async fn current(&self) -> Result<CurrentWeather> {
        CurrentWeather::from_value(self.all_weather().await?)
    }

    pub async fn temperature(&self) -> Result<f64> {
        number_at(&self.all_weather().await?, "/main/temp", "main.temp")
    }

    pub async fn pressure(&self) -> Result<f64> {
        number_at(&self.all_weather().await?, "/main/pressure", "main.pressure")
    }

    pub async fn humidity(&self) -> Result<f64> {
        number_at(&self.all_weather().await?, "/main/humidity", "main.humidity")
    }

    pub async fn description(&self) -> Result<String> {
        self.all_weather()
            .await?
            .pointer("/weather/0/description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(Error::MissingField("weather[0].description"))
    }

    pub async fn weather_forecast(&self) -> Result<Value> {
        self.fetch(Endpoint::Forecast).await
    }

    pub async fn weather_forecast_for_days(&self, days: u32) -> Result<Value> {
        self.fetch(Endpoint::ForecastDays(days)).await
    }

    pub async fn weather_forecast_for_hours(&self, hours: u32) -> Result<Value> {
        self.fetch(Endpoint::ForecastHours(hours)).await
    }

    pub async fn smart_json(&self) -> Result<SmartWeather> {
        SmartWeather::from_current(&self.current().await?)
    }

    /// Request a resource that does not exist and return the resulting
    /// failure. Useful for checking how transport errors look.
    #[instrument(skip(self))]
    pub async fn error(&self) -> Error {
        transport::get_error(&self.pool, &self.config, &query::crash_path()).await
    }
}

fn number_at(json: &Value, pointer: &str, field: &'static str) -> Result<f64> {
    json.pointer(pointer)
        .and_then(Value::as_f64)
        .ok_or(Error::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "2a1ad423e9fad1a3ceda81fda56b1366";

    #[test]
    fn setters_leave_receiver_untouched() {
        let weather = OpenWeatherMap::new();
        let before = weather.config().clone();

        let _ = weather.set_app_id(KEY);
        let _ = weather.set_lang("IT");
        let _ = weather.set_units("Imperial");
        let _ = weather.set_city("Milano");
        let _ = weather.set_coordinate(1.0, 2.0);
        let _ = weather.set_city_id(7u64);
        let _ = weather.set_zip_code("94040,us");
        let _ = weather.set_ssl(true);
        let _ = weather.set_keep_alive(Some(Duration::from_secs(5)));
        let _ = weather.set_host("localhost:8080");
        let _ = weather.set_retries(9);

        assert_eq!(weather.config(), &before);
    }

    #[test]
    fn set_app_id_lang_units() {
        let weather = OpenWeatherMap::new()
            .set_app_id(KEY)
            .set_lang("IT")
            .set_units("METRIC");

        assert_eq!(weather.app_id(), Some(KEY));
        assert_eq!(weather.lang(), "it");
        assert_eq!(weather.units(), "metric");
        assert_eq!(weather.format(), "json");
    }

    #[test]
    fn set_city_lowercases_and_encodes() {
        assert_eq!(OpenWeatherMap::new().set_city("Fairplay").city(), "fairplay");
        assert_eq!(OpenWeatherMap::new().set_city("New York").city(), "new%20york");
        assert_eq!(OpenWeatherMap::new().set_city("São Paulo").city(), "s%C3%A3o%20paulo");
    }

    #[test]
    fn set_city_keeps_uri_component_punctuation() {
        let weather = OpenWeatherMap::new().set_city("O'Fallon (MO)!");
        assert_eq!(weather.city(), "o'fallon%20(mo)!");

        let weather = OpenWeatherMap::new().set_city("Saint-Jean~*_.");
        assert_eq!(weather.city(), "saint-jean~*_.");
    }

    #[test]
    fn set_city_keeps_other_selectors() {
        let weather = OpenWeatherMap::new()
            .set_zip_code("94040,us")
            .set_city_id(4367872u64)
            .set_city("Rome");

        assert_eq!(weather.zip_code(), Some("94040,us"));
        assert_eq!(weather.city_id(), Some(CityId(4367872)));
    }

    #[test]
    fn set_coordinate_is_stored_verbatim() {
        let weather = OpenWeatherMap::new().set_coordinate(50.0467656, 20.0048731);
        assert_eq!(
            weather.coordinate(),
            Coordinate { latitude: Some(50.0467656), longitude: Some(20.0048731) }
        );
    }

    #[test]
    fn set_city_id_from_number_or_string() {
        let id: CityId = "4367872".parse().expect("numeric id");
        assert_eq!(OpenWeatherMap::new().set_city_id(id).city_id(), Some(CityId(4367872)));
        assert_eq!(OpenWeatherMap::new().set_city_id(4367872u32).city_id(), Some(CityId(4367872)));
    }

    #[test]
    fn pool_is_shared_until_transport_settings_change() {
        let weather = OpenWeatherMap::new().set_keep_alive(Some(Duration::from_secs(30)));
        let derived = weather.set_city("Oslo").set_units("imperial");
        assert!(weather.connection_pool().shares_connections_with(derived.connection_pool()));

        let same_ssl = weather.set_ssl(false);
        assert!(weather.connection_pool().shares_connections_with(same_ssl.connection_pool()));

        let secure = weather.set_ssl(true);
        assert!(secure.ssl());
        assert!(!weather.connection_pool().shares_connections_with(secure.connection_pool()));

        let longer = weather.set_keep_alive(Some(Duration::from_secs(60)));
        assert_eq!(longer.keep_alive(), Some(Duration::from_secs(60)));
        assert!(!weather.connection_pool().shares_connections_with(longer.connection_pool()));
    }

    #[test]
    fn build_path_variants_use_current_config() {
        let weather = OpenWeatherMap::new().set_app_id("K").set_city_id(42u64);

        assert!(weather.build_path().starts_with("/data/2.5/weather?id=42&"));
        assert!(weather.build_path_forecast().starts_with("/data/2.5/forecast?id=42&"));
        assert!(weather.build_path_forecast_for_days(3).contains("cnt=3"));
        assert!(weather.build_path_forecast_for_hours(6).contains("cnt=6"));
    }

    #[test]
    fn with_config_uses_given_values() {
        let cfg = Configuration {
            units: "standard".into(),
            retries: 5,
            ..Configuration::default()
        };
        let weather = OpenWeatherMap::with_config(cfg);

        assert_eq!(weather.units(), "standard");
        assert_eq!(weather.retries(), 5);
        assert_eq!(weather.city(), "fairplay");
        assert_eq!(weather.host(), "api.openweathermap.org");
    }

    #[test]
    fn number_at_reports_missing_field() {
        let json = serde_json::json!({ "main": { "temp": 3 } });
        assert_eq!(number_at(&json, "/main/temp", "main.temp").unwrap(), 3.0);
        assert!(matches!(
            number_at(&json, "/main/pressure", "main.pressure"),
            Err(Error::MissingField("main.pressure"))
        ));
    }
}
