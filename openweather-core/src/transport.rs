//! HTTP execution for OpenWeatherMap requests.

use std::{sync::Arc, time::Duration};

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::{
    config::Configuration,
    error::{Error, Result},
};

/// Shared HTTP connection pool for one configuration lineage.
///
/// Clones share the same underlying [`Client`], which is built on first use.
/// A client derived with a different `ssl` or keep-alive policy gets a fresh
/// handle via [`ConnectionPool::new`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionPool {
    client: Arc<OnceCell<Client>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `self` and `other` hand out the same connections.
    pub fn shares_connections_with(&self, other: &ConnectionPool) -> bool {
        Arc::ptr_eq(&self.client, &other.client)
    }

    async fn client(&self, keep_alive: Option<u64>) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async move { build_client(keep_alive) })
            .await
    }
}

fn build_client(keep_alive: Option<u64>) -> Result<Client> {
    let builder = match keep_alive {
        Some(ms) => {
            let idle = Duration::from_millis(ms);
            Client::builder()
                .pool_idle_timeout(idle)
                .tcp_keepalive(idle)
        }
        None => Client::builder().pool_max_idle_per_host(0),
    };

    debug!(?keep_alive, "building OpenWeatherMap HTTP client");
    Ok(builder.build()?)
}

fn base_url(cfg: &Configuration) -> String {
    let scheme = if cfg.ssl { "https" } else { "http" };
    format!("{scheme}://{}", cfg.host)
}

/// One GET round trip: status and full body.
async fn fetch(pool: &ConnectionPool, cfg: &Configuration, path: &str) -> Result<(StatusCode, String)> {
    let client = pool.client(cfg.keep_alive).await?;
    let url = format!("{}{}", base_url(cfg), path);

    let res = client.get(&url).send().await?;
    let status = res.status();
    let body = res.text().await?;

    Ok((status, body))
}

/// Fetch `path` and parse the body as JSON.
///
/// Empty bodies are retried immediately while the configuration's retry
/// budget allows; every other failure is returned as-is.
#[instrument(skip(pool, cfg), fields(host = %cfg.host, ssl = cfg.ssl))]
pub(crate) async fn get_data(pool: &ConnectionPool, cfg: &Configuration, path: &str) -> Result<Value> {
    let budget = cfg.retries.max(1);

    for attempt in 1..=budget {
        let (status, body) = fetch(pool, cfg, path).await?;

        if status != StatusCode::OK {
            warn!(%status, "OpenWeatherMap request failed");
            return Err(Error::HttpStatus { status: status.as_u16(), body });
        }

        if body.is_empty() {
            warn!(attempt, budget, "empty response body from OpenWeatherMap");
            continue;
        }

        debug!(attempt, bytes = body.len(), "received OpenWeatherMap response");
        return parse_body(&body);
    }

    Err(Error::RetriesExhausted { attempts: budget })
}

/// Send the diagnostic request and return whatever failure it produced.
pub(crate) async fn get_error(pool: &ConnectionPool, cfg: &Configuration, path: &str) -> Error {
    match fetch(pool, cfg, path).await {
        Err(e) => e,
        Ok((status, body)) if status != StatusCode::OK => {
            Error::HttpStatus { status: status.as_u16(), body }
        }
        Ok(_) => Error::UnexpectedSuccess,
    }
}

fn parse_body(body: &str) -> Result<Value> {
    let json: Value = serde_json::from_str(body)?;

    if let Some(code) = json.get("cod").and_then(api_code).filter(|c| *c != 200) {
        return Err(Error::Api { code, payload: json });
    }

    Ok(json)
}

/// `cod` arrives as a number on success and as a string on most errors.
fn api_code(cod: &Value) -> Option<i64> {
    match cod {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
