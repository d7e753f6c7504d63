use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Current-conditions payload of `/data/2.5/weather`.
///
/// Only the fields this crate projects are typed; use
/// [`crate::OpenWeatherMap::all_weather`] for the full document.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dt: i64,
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub rain: Option<Rain>,
    pub precipitation: Option<Precipitation>,
    pub cod: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub feels_like: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub id: i64,
    #[serde(default)]
    pub main: String,
    pub description: String,
}

/// Rain volume in mm for the last one or three hours.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rain {
    #[serde(rename = "1h")]
    pub one_hour: Option<f64>,
    #[serde(rename = "3h")]
    pub three_hours: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Precipitation {
    pub value: f64,
}

impl CurrentWeather {
    pub fn from_value(json: Value) -> Result<Self> {
        Ok(serde_json::from_value(json)?)
    }

    /// First reported condition; the API always sends at least one.
    pub fn condition(&self) -> Result<&Condition> {
        self.weather.first().ok_or(Error::MissingField("weather[0]"))
    }

    pub fn observation_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.dt, 0)
    }

    /// Hourly rain estimate.
    ///
    /// An explicit `precipitation.value` wins. Otherwise the 3h accumulation is
    /// normalized to one hour and rounded, with the 1h reading used when the
    /// 3h window is absent. No rain data at all means 0.
    pub fn hourly_rain(&self) -> f64 {
        if let Some(p) = &self.precipitation {
            return p.value;
        }
        match &self.rain {
            Some(Rain { three_hours: Some(mm), .. }) => (mm / 3.0).round(),
            Some(Rain { one_hour: Some(mm), .. }) => mm.round(),
            _ => 0.0,
        }
    }
}

/// Denormalized summary of current conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartWeather {
    pub temp: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub description: String,
    pub weathercode: i64,
    pub rain: f64,
}

impl SmartWeather {
    pub fn from_current(current: &CurrentWeather) -> Result<Self> {
        let condition = current.condition()?;

        Ok(Self {
            temp: current.main.temp,
            humidity: current.main.humidity,
            pressure: current.main.pressure,
            description: condition.description.clone(),
            weathercode: condition.id,
            rain: current.hourly_rain(),
        })
    }
}
