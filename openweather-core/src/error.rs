use serde_json::{Value, json};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a single logical request.
///
/// Only [`Error::RetriesExhausted`] is the product of retrying; every other
/// variant is terminal for the call that produced it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OpenWeatherMap request failed with status {status}: {}", truncate_body(.body))]
    HttpStatus { status: u16, body: String },

    #[error("OpenWeatherMap returned an empty body {attempts} time(s); retry budget exhausted")]
    RetriesExhausted { attempts: u32 },

    #[error("failed to parse OpenWeatherMap JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("OpenWeatherMap API error {code}: {}", api_message(.payload))]
    Api { code: i64, payload: Value },

    #[error("OpenWeatherMap response is missing `{0}`")]
    MissingField(&'static str),

    #[error("diagnostic request unexpectedly succeeded")]
    UnexpectedSuccess,

    #[error("invalid city id '{0}': expected a non-negative integer")]
    InvalidCityId(String),
}

impl Error {
    /// HTTP or API status code attached to this error, if any.
    pub fn status(&self) -> Option<i64> {
        match self {
            Error::HttpStatus { status, .. } => Some(i64::from(*status)),
            Error::Api { code, .. } => Some(*code),
            Error::Transport(e) => e.status().map(|s| i64::from(s.as_u16())),
            _ => None,
        }
    }

    /// JSON rendering of the failure.
    ///
    /// API errors hand back the payload the server sent; everything else is
    /// wrapped as `{"error": "<cause>"}`.
    pub fn payload(&self) -> Value {
        match self {
            Error::Api { payload, .. } => payload.clone(),
            Error::HttpStatus { status, body } => json!({
                "error": self.to_string(),
                "status": status,
                "body": body,
            }),
            other => json!({ "error": other.to_string() }),
        }
    }
}

fn api_message(payload: &Value) -> &str {
    payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
