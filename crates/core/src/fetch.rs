//! Content fetching from URLs, files, and stdin.
//!
//! This module provides functions for retrieving HTML content from
//! various sources: HTTP/HTTPS URLs, local files, and standard input.
//! URL fetching needs the `fetch` feature.

use std::fs;
use std::path::PathBuf;

use url::Url;

use crate::{ContxtError, Result};

/// HTTP client configuration for fetching web pages.
///
/// This struct controls timeout and user agent settings for HTTP requests.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: 30, user_agent: default_user_agent() }
    }
}

/// Browser-like User-Agent identifying the tool
pub fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; contxt/{}; +https://github.com/contxt/contxt)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Where a piece of input comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Url(Url),
    File(PathBuf),
    Stdin,
}

impl InputSource {
    /// Classify a command-line input: `-` is stdin, an http(s) URL is fetched,
    /// anything else is a file path
    pub fn parse(input: &str) -> Self {
        if input == "-" {
            return InputSource::Stdin;
        }
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => InputSource::Url(url),
            _ => InputSource::File(PathBuf::from(input)),
        }
    }

    /// The URL, if this input is one
    pub fn url(&self) -> Option<&Url> {
        match self {
            InputSource::Url(url) => Some(url),
            _ => None,
        }
    }
}

/// Whether `url` lies under one of the ignored subpaths
///
/// A pattern `tags` (or `/tags/`) matches any URL containing `/tags/`.
pub fn is_ignored(url: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .map(|p| p.trim().trim_matches('/'))
        .filter(|p| !p.is_empty())
        .any(|p| url.contains(&format!("/{}/", p)))
}

/// Fetches HTML content from a URL.
///
/// This function performs an HTTP GET request and returns the response body as text.
/// It follows redirects, respects the configured timeout, and treats non-success
/// status codes as errors.
#[cfg(feature = "fetch")]
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    use reqwest::Client;
    use std::time::Duration;

    let parsed_url = Url::parse(url).map_err(|e| ContxtError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed_url.scheme(), "http" | "https") {
        return Err(ContxtError::InvalidUrl(
            "URL must use the http:// or https:// scheme".to_string(),
        ));
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(ContxtError::HttpError)?;

    tracing::debug!(url = %parsed_url, timeout = config.timeout, "fetching page");

    let response = client
        .get(parsed_url)
        .header("User-Agent", &config.user_agent)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ContxtError::Timeout { timeout: config.timeout }
            } else {
                ContxtError::HttpError(e)
            }
        })?
        .error_for_status()?;

    let content = response.text().await?;

    Ok(content)
}

/// Reads HTML content from a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(ContxtError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(ContxtError::from)
    }
}

/// Reads HTML content from standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(ContxtError::from)?;

    Ok(buffer)
}
