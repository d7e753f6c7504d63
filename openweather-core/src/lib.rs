//! Client library for the OpenWeatherMap HTTP API.
//!
//! This crate defines:
//! - An immutable request configuration with fluent `set_*` builders
//! - Path building for current weather and forecast endpoints
//! - Request execution with empty-body retry and status/API error checks
//! - Typed projections (temperature, pressure, humidity, smart summary)
//!
//! Logging goes through `tracing`; install a subscriber in the binary to see it.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod transport;

pub use client::{Coordinate, OpenWeatherMap};
pub use config::{CityId, Configuration};
pub use error::{Error, Result};
pub use model::{CurrentWeather, SmartWeather};
pub use query::Endpoint;
