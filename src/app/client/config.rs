//! HTTP client configuration and building

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};

use crate::constants::http;
use crate::errors::ConfigError;

/// Settings for one [`super::PixivClient`] instance.
///
/// The pipeline builds two clients from the same transport options: one
/// with the parse timeout for the discovery and info pools, one with the
/// download timeout for the download pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session cookie, typically just the `PHPSESSID` pair.
    pub cookie: String,
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Optional proxy URL (http, https, or socks5).
    pub proxy: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cookie: String::new(),
            user_agent: http::DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build the underlying reqwest client with default headers applied.
    pub fn build_http_client(&self) -> Result<reqwest::Client, ConfigError> {
        let mut headers = HeaderMap::new();
        if !self.cookie.is_empty() {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&self.cookie).map_err(|_| ConfigError::InvalidValue {
                    field: "cookie".to_string(),
                    reason: "contains characters not allowed in a header".to_string(),
                })?,
            );
        }
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent).map_err(|_| ConfigError::InvalidValue {
                field: "user_agent".to_string(),
                reason: "contains characters not allowed in a header".to_string(),
            })?,
        );

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .connect_timeout(Duration::from_millis(http::CONNECT_TIMEOUT_MS));

        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|error| ConfigError::InvalidValue {
                field: "proxy".to_string(),
                reason: error.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(|error| ConfigError::InvalidValue {
            field: "client".to_string(),
            reason: error.to_string(),
        })
    }
}
