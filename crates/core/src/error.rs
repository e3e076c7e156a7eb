//! Error types for contxt operations.
//!
//! This module defines the main error type [`ContxtError`] which represents
//! everything that can go wrong while fetching a page, reading configuration,
//! or rendering a document.
//!
//! Conversion itself is infallible for unusual markup: the only conversion
//! error is [`ContxtError::NoContent`], returned when there is nothing to
//! convert at all.
//!
//! # Example
//!
//! ```rust
//! use contxt_core::{ContxtError, Result};
//!
//! fn require_html(html: &str) -> Result<&str> {
//!     if html.trim().is_empty() {
//!         return Err(ContxtError::NoContent);
//!     }
//!     Ok(html)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for contxt operations.
///
/// # Example
///
/// ```rust
/// use contxt_core::{ContxtError, FormatContext, page};
///
/// match page::render("", None, &FormatContext::default()) {
///     Ok(rendered) => println!("{}", rendered.output),
///     Err(ContxtError::NoContent) => println!("nothing to convert"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum ContxtError {
    /// HTTP request errors from reqwest.
    ///
    /// This variant wraps network errors, DNS failures, connection issues,
    /// and non-success status codes.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing errors, usually an invalid CSS selector.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// The input was empty, so there is nothing to convert.
    #[error("No content could be extracted from the document")]
    NoContent,

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File read/write errors.
    #[error("Failed to write to file: {0}")]
    WriteError(#[from] std::io::Error),

    /// Configuration file errors.
    ///
    /// Returned when the config file exists but cannot be parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<toml::de::Error> for ContxtError {
    fn from(err: toml::de::Error) -> Self {
        ContxtError::ConfigError(err.to_string())
    }
}

/// Result type alias for ContxtError.
pub type Result<T> = std::result::Result<T, ContxtError>;
