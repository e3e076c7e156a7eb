//! `scraper`-backed document used for page metadata.
//!
//! [`Document`] answers selector queries against the untouched page (title,
//! `<meta>` tags, JSON-LD) and is the source the conversion arena in
//! [`crate::dom`] is built from.
//!
//! ```rust
//! use contxt_core::parse::Document;
//!
//! let doc = Document::parse(r#"<html><head><title>Title</title></head><body><p class="lead">Hi</p></body></html>"#);
//! assert_eq!(doc.title(), Some("Title".to_string()));
//! assert_eq!(doc.select("p.lead").unwrap().len(), 1);
//! ```

use scraper::{ElementRef, Html, Selector};

use crate::{ContxtError, Result};

/// A parsed HTML page
///
/// Parsing never fails: html5ever recovers from malformed markup the way a
/// browser does.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html) }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Elements matching a CSS selector
    ///
    /// # Errors
    ///
    /// Returns [`ContxtError::HtmlParseError`] if the selector is invalid.
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = Selector::parse(selector)
            .map_err(|e| ContxtError::HtmlParseError(format!("Invalid selector {:?}: {}", selector, e)))?;
        Ok(self.html.select(&sel).map(|element| Element { element }).collect())
    }

    /// First element matching `selector`; `None` for no match or a bad selector
    pub fn select_first(&'_ self, selector: &str) -> Option<Element<'_>> {
        let sel = Selector::parse(selector).ok()?;
        self.html.select(&sel).next().map(|element| Element { element })
    }

    /// Trimmed `<title>` text, `None` when missing or blank
    pub fn title(&self) -> Option<String> {
        self.select_first("title")
            .map(|el| el.text().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// `content` of the first `<meta>` whose `property` or `name` is `key`
    ///
    /// ```rust
    /// use contxt_core::parse::Document;
    ///
    /// let doc = Document::parse(r#"<meta property="og:title" content=" OG ">"#);
    /// assert_eq!(doc.meta_content("og:title"), Some("OG".to_string()));
    /// ```
    pub fn meta_content(&self, key: &str) -> Option<String> {
        let selector = format!(r#"meta[property="{key}"], meta[name="{key}"]"#);
        self.select_first(&selector)
            .and_then(|el| el.attr("content").map(|c| c.trim().to_string()))
            .filter(|c| !c.is_empty())
    }

    /// Every text node of the page, concatenated
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }
}

/// An element of a [`Document`]
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }
}
