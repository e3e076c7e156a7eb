use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ContxtError;

/// Output dialect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Markdown,
    Xml,
    Tagged,
    /// Formatted, re-indented HTML
    Html,
    /// Cleaned main-content HTML, untouched
    Raw,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [Dialect::Markdown, Dialect::Xml, Dialect::Tagged, Dialect::Html, Dialect::Raw];

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Markdown => "markdown",
            Dialect::Xml => "xml",
            Dialect::Tagged => "tagged",
            Dialect::Html => "html",
            Dialect::Raw => "raw",
        }
    }

    /// File extension for saved output
    pub fn extension(self) -> &'static str {
        match self {
            Dialect::Markdown => "md",
            Dialect::Xml => "xml",
            Dialect::Tagged => "txt",
            Dialect::Html | Dialect::Raw => "html",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = ContxtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(Dialect::Markdown),
            "xml" => Ok(Dialect::Xml),
            "tagged" | "text" | "txt" => Ok(Dialect::Tagged),
            "html" => Ok(Dialect::Html),
            "raw" => Ok(Dialect::Raw),
            other => Err(ContxtError::ConfigError(format!("Unknown output format: {}", other))),
        }
    }
}

/// Per-call conversion settings, never mutated during a walk
#[derive(Debug, Clone)]
pub struct FormatContext {
    pub dialect: Dialect,
    /// Treat the walk root as already inside `<pre>`
    pub preformatted: bool,
    /// Append the collected images section (body images are always rendered)
    pub include_images: bool,
    /// Image URL to local path substitutions
    pub image_map: HashMap<String, String>,
    /// Base for resolving relative `href` and `src` values
    pub base_url: Option<Url>,
    /// Emit the markdown frontmatter block
    pub frontmatter: bool,
    /// Emit the markdown `Source:` line
    pub source_link: bool,
    /// Drop non-essential attributes before conversion
    pub strip_attributes: bool,
}

impl Default for FormatContext {
    fn default() -> Self {
        Self {
            dialect: Dialect::Markdown,
            preformatted: false,
            include_images: false,
            image_map: HashMap::new(),
            base_url: None,
            frontmatter: true,
            source_link: true,
            strip_attributes: false,
        }
    }
}

impl FormatContext {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect, ..Default::default() }
    }

    pub fn builder() -> FormatContextBuilder {
        FormatContextBuilder::default()
    }

    /// Resolve `href` against the base URL, falling back to the raw string
    pub fn resolve(&self, href: &str) -> String {
        match &self.base_url {
            Some(base) => base.join(href).map(String::from).unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }

    /// The path an image should be referenced by: the local copy when one
    /// was downloaded, otherwise the resolved URL
    pub fn image_target(&self, src: &str) -> String {
        let resolved = self.resolve(src);
        self.image_map
            .get(&resolved)
            .or_else(|| self.image_map.get(src))
            .cloned()
            .unwrap_or(resolved)
    }
}

/// Builder for [`FormatContext`]
#[derive(Debug, Default)]
pub struct FormatContextBuilder {
    context: FormatContext,
}

impl FormatContextBuilder {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.context.dialect = dialect;
        self
    }

    pub fn preformatted(mut self, preformatted: bool) -> Self {
        self.context.preformatted = preformatted;
        self
    }

    pub fn include_images(mut self, include: bool) -> Self {
        self.context.include_images = include;
        self
    }

    pub fn image_map(mut self, map: HashMap<String, String>) -> Self {
        self.context.image_map = map;
        self
    }

    pub fn base_url(mut self, url: Option<Url>) -> Self {
        self.context.base_url = url;
        self
    }

    pub fn frontmatter(mut self, enabled: bool) -> Self {
        self.context.frontmatter = enabled;
        self
    }

    pub fn source_link(mut self, enabled: bool) -> Self {
        self.context.source_link = enabled;
        self
    }

    pub fn strip_attributes(mut self, enabled: bool) -> Self {
        self.context.strip_attributes = enabled;
        self
    }

    pub fn build(self) -> FormatContext {
        self.context
    }
}
