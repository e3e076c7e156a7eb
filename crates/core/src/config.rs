//! User configuration file.
//!
//! Settings live in `<config dir>/contxt/config.toml` (for example
//! `~/.config/contxt/config.toml` on Linux). Every key is optional; missing
//! keys and a missing file fall back to the defaults below, and command-line
//! flags override whatever the file says.
//!
//! ```toml
//! [output]
//! format = "markdown"
//! directory = "notes/web"
//!
//! [scraping]
//! include_images = false
//! timeout = 30
//! ignore_patterns = ["tags", "category"]
//! strip_attributes = false
//!
//! [markdown]
//! frontmatter = true
//! source_link = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::default_user_agent;
use crate::{ContxtError, Dialect, FetchConfig, FormatContext, Result};

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: Dialect,
    /// Directory rendered pages are saved to when no output file is given
    pub directory: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { format: Dialect::Markdown, directory: None }
    }
}

/// Fetch and collection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub include_images: bool,
    /// Request timeout in seconds
    pub timeout: u64,
    pub user_agent: String,
    /// URL path segments to skip, e.g. `tags` skips `https://x.org/tags/rust`
    pub ignore_patterns: Vec<String>,
    /// Drop attributes other than links, sources and layout hints
    pub strip_attributes: bool,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            include_images: false,
            timeout: 30,
            user_agent: default_user_agent(),
            ignore_patterns: Vec::new(),
            strip_attributes: false,
        }
    }
}

/// Markdown page options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    pub frontmatter: bool,
    pub source_link: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self { frontmatter: true, source_link: true }
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub scraping: ScrapingConfig,
    pub markdown: MarkdownConfig,
}

impl Config {
    /// Default location of the config file, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("contxt").join("config.toml"))
    }

    /// Load the config from [`Config::default_path`]
    ///
    /// A missing file (or a platform without a config directory) gives the
    /// defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load the config from `path`; a missing file gives the defaults
    ///
    /// # Errors
    ///
    /// Returns [`ContxtError::ConfigError`] when the file exists but is not
    /// valid TOML for this structure.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ContxtError::ConfigError(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Fetch settings taken from `[scraping]`
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig { timeout: self.scraping.timeout, user_agent: self.scraping.user_agent.clone() }
    }

    /// A conversion context seeded from this config
    pub fn format_context(&self) -> FormatContext {
        FormatContext::builder()
            .dialect(self.output.format)
            .include_images(self.scraping.include_images)
            .frontmatter(self.markdown.frontmatter)
            .source_link(self.markdown.source_link)
            .strip_attributes(self.scraping.strip_attributes)
            .build()
    }
}
