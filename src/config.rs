use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use reqwest::Url;
use std::env;
use std::time::Duration;

pub const BACKEND_URL_VAR: &str = "PAGEPICK_BACKEND_URL";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Default for every backend request, including the extraction call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: Url,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let raw = env::var(BACKEND_URL_VAR).unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        Self::with_backend_url(&raw).with_context(|| format!("{} is invalid", BACKEND_URL_VAR))
    }

    pub fn with_backend_url(raw: &str) -> Result<Self> {
        let raw = raw.trim().trim_end_matches('/');
        let backend_url =
            Url::parse(raw).with_context(|| format!("Invalid backend URL: {}", raw))?;

        match backend_url.scheme() {
            "http" | "https" => {}
            other => bail!("Unsupported backend URL scheme: {}", other),
        }

        Ok(Config {
            backend_url,
            request_timeout: REQUEST_TIMEOUT,
        })
    }
}
