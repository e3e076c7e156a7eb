use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::Document;

/// Title used when a page offers nothing better
pub const UNTITLED: &str = "No title";

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[\w'-]+\b").unwrap());

/// Page-level metadata gathered before conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub date: Option<String>,
    pub language: Option<String>,
    pub word_count: usize,
    /// Rough token count of the rendered output (characters / 4)
    pub token_estimate: usize,
}

impl Metadata {
    /// The page title, or [`UNTITLED`]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }

    /// Whether any OpenGraph field is present
    pub fn has_open_graph(&self) -> bool {
        self.og_title.is_some() || self.og_description.is_some() || self.og_image.is_some()
    }
}

impl Document {
    /// Extract title with priority fallback:
    /// 1. `<title>` element
    /// 2. First `<h1>` element
    /// 3. Open Graph `og:title`
    pub fn extract_title(&self) -> Option<String> {
        if let Some(title) = self.title() {
            return Some(title);
        }

        if let Some(h1) = self.select_first("h1") {
            let text = crate::postprocess::normalize_whitespace(&h1.text());
            if !text.is_empty() {
                return Some(text);
            }
        }

        self.meta_content("og:title")
    }

    /// Extract description with priority fallback:
    /// 1. Open Graph `og:description`
    /// 2. Meta `description`
    pub fn extract_description(&self) -> Option<String> {
        self.meta_content("og:description")
            .or_else(|| self.meta_content("description"))
    }

    /// Extract date with priority fallback:
    /// 1. JSON-LD `datePublished`
    /// 2. Meta `article:published_time`
    /// 3. `<time datetime="">` element
    /// 4. Meta `date` / `DC.date`
    pub fn extract_date(&self) -> Option<String> {
        if let Some(json_ld) = self.extract_json_ld()
            && let Some(date) = json_ld.get("datePublished")
            && let Some(value) = date.as_str()
        {
            return Some(value.to_string());
        }

        if let Some(date) = self.meta_content("article:published_time") {
            return Some(date);
        }

        if let Some(time) = self.select_first("time[datetime]")
            && let Some(datetime) = time.attr("datetime")
        {
            return Some(datetime.to_string());
        }

        self.meta_content("date").or_else(|| self.meta_content("DC.date"))
    }

    /// The `lang` attribute of the root `<html>` element
    pub fn extract_language(&self) -> Option<String> {
        self.select_first("html[lang]")
            .and_then(|el| el.attr("lang").map(str::to_string))
            .filter(|lang| !lang.trim().is_empty())
    }

    /// Count words in the document's text
    pub fn calculate_word_count(&self) -> usize {
        count_words(&self.text_content())
    }

    /// Extract all metadata at once
    pub fn extract_metadata(&self, url: Option<&str>) -> Metadata {
        Metadata {
            title: self.extract_title(),
            url: url.map(str::to_string),
            description: self.extract_description(),
            og_title: self.meta_content("og:title"),
            og_description: self.meta_content("og:description"),
            og_image: self.meta_content("og:image"),
            date: self.extract_date(),
            language: self.extract_language(),
            word_count: self.calculate_word_count(),
            token_estimate: 0,
        }
    }

    /// Extract and parse the first valid JSON-LD block
    fn extract_json_ld(&self) -> Option<serde_json::Value> {
        self.select(r#"script[type="application/ld+json"]"#)
            .ok()?
            .iter()
            .find_map(|el| serde_json::from_str::<serde_json::Value>(el.text().trim()).ok())
    }
}

/// Count words in text, handling various whitespace and punctuation patterns
pub fn count_words(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

/// Estimate the token count of `text` at four characters per token
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML_WITH_META: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <title>Test Page Title</title>
            <meta name="description" content="Plain description.">
            <meta property="og:title" content="OG Title">
            <meta property="og:description" content="OG Description">
            <meta property="og:image" content="https://example.com/cover.png">
            <meta property="article:published_time" content="2024-02-01T08:00:00Z">
            <script type="application/ld+json">
            {
                "@context": "https://schema.org",
                "@type": "Article",
                "datePublished": "2024-01-15T10:30:00Z"
            }
            </script>
        </head>
        <body>
            <h1>Main Heading</h1>
            <p>This is the first paragraph of the content. It contains multiple words that should be counted.</p>
            <time datetime="2024-03-20T14:00:00Z">March 20, 2024</time>
        </body>
        </html>
    "#;

    #[test]
    fn test_extract_title_prefers_title_tag() {
        let doc = Document::parse(HTML_WITH_META);
        assert_eq!(doc.extract_title(), Some("Test Page Title".to_string()));
    }

    #[test]
    fn test_extract_title_fallbacks() {
        let doc = Document::parse(r#"<h1>  Heading   One </h1><meta property="og:title" content="OG">"#);
        assert_eq!(doc.extract_title(), Some("Heading One".to_string()));

        let doc = Document::parse(r#"<head><meta property="og:title" content="OG"></head><p>x</p>"#);
        assert_eq!(doc.extract_title(), Some("OG".to_string()));

        let doc = Document::parse("<p>nothing</p>");
        assert_eq!(doc.extract_title(), None);
        assert_eq!(doc.extract_metadata(None).display_title(), UNTITLED);
    }

    #[test]
    fn test_extract_description() {
        let doc = Document::parse(HTML_WITH_META);
        assert_eq!(doc.extract_description(), Some("OG Description".to_string()));

        let doc = Document::parse(r#"<meta name="description" content="Plain">"#);
        assert_eq!(doc.extract_description(), Some("Plain".to_string()));
    }

    #[test]
    fn test_extract_date_from_json_ld() {
        let doc = Document::parse(HTML_WITH_META);
        assert_eq!(doc.extract_date(), Some("2024-01-15T10:30:00Z".to_string()));
    }

    #[test]
    fn test_extract_date_from_time_element() {
        let doc = Document::parse(r#"<body><time datetime="2024-03-20T14:00:00Z">March 20</time></body>"#);
        assert_eq!(doc.extract_date(), Some("2024-03-20T14:00:00Z".to_string()));
    }

    #[test]
    fn test_extract_all_metadata() {
        let doc = Document::parse(HTML_WITH_META);
        let metadata = doc.extract_metadata(Some("https://example.com/page"));

        assert_eq!(metadata.url.as_deref(), Some("https://example.com/page"));
        assert_eq!(metadata.og_title.as_deref(), Some("OG Title"));
        assert_eq!(metadata.og_image.as_deref(), Some("https://example.com/cover.png"));
        assert_eq!(metadata.language.as_deref(), Some("en"));
        assert!(metadata.has_open_graph());
        assert!(metadata.word_count > 10);
    }

    #[test]
    fn test_metadata_serializes() {
        let metadata = Metadata { title: Some("T".to_string()), word_count: 3, ..Default::default() };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["title"], "T");
        assert_eq!(json["word_count"], 3);
        assert!(json["og_image"].is_null());
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("hello world"), 2);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("word's with-apostrophe"), 2);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
