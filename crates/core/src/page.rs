//! Whole-page rendering: HTML in, one dialect out.
//!
//! [`render`] runs the full pipeline: metadata is read from the untouched
//! document, the HTML is cleaned, the main content is located in the arena
//! tree, images are collected and the dialect's [`Formatter`] wraps the
//! converted body in its page header and footer.

use serde::Serialize;
use url::Url;

use crate::dom::DomTree;
use crate::formatters::xml::{XML_DECLARATION, escape_attr, escape_text};
use crate::formatters::{PageParts, formatter_for};
use crate::images::{ImageRef, collect_images};
use crate::metadata::{Metadata, estimate_tokens};
use crate::{ContxtError, Dialect, Document, FormatContext, PreprocessConfig, Result, preprocess_html};

/// The result of rendering one page
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPage {
    /// The page in the requested dialect
    pub output: String,
    pub metadata: Metadata,
    /// Images referenced by the main content (plus the OpenGraph image)
    pub images: Vec<ImageRef>,
}

/// Render `html` as a complete page in the context's dialect
///
/// `source_url` is recorded in the metadata and, when it parses, used as the
/// base for relative links unless the context already carries one.
///
/// # Errors
///
/// Returns [`ContxtError::NoContent`] when `html` is empty or whitespace.
///
/// # Example
///
/// ```rust
/// use contxt_core::{Dialect, FormatContext, page};
///
/// let html = "<html><head><title>Hello</title></head><body><h1>Hi</h1><p>Text</p></body></html>";
/// let rendered = page::render(html, Some("https://example.com"), &FormatContext::new(Dialect::Tagged)).unwrap();
/// assert!(rendered.output.contains("h1: Hi"));
/// assert_eq!(rendered.metadata.title.as_deref(), Some("Hello"));
/// ```
pub fn render(html: &str, source_url: Option<&str>, cx: &FormatContext) -> Result<RenderedPage> {
    if html.trim().is_empty() {
        return Err(ContxtError::NoContent);
    }

    let base_url = match &cx.base_url {
        Some(base) => Some(base.clone()),
        None => source_url.and_then(|url| match Url::parse(url) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(url, error = %e, "source URL does not parse; relative links left as-is");
                None
            }
        }),
    };
    let cx = FormatContext { base_url: base_url.clone(), ..cx.clone() };

    let mut metadata = Document::parse(html).extract_metadata(source_url);

    let preprocess = PreprocessConfig { base_url, strip_attributes: cx.strip_attributes, ..Default::default() };
    let cleaned = preprocess_html(html, &preprocess);
    let tree = DomTree::from_document(&Document::parse(&cleaned));
    let root = tree.main_content();
    tracing::debug!(root, tag = tree.tag(root), nodes = tree.len(), "selected content root");

    let images = collect_images(&tree, root, &cx, metadata.og_image.as_deref());
    let parts = PageParts { tree: &tree, root, metadata: &metadata, images: &images };
    let output = formatter_for(&cx).page(&parts);

    metadata.token_estimate = estimate_tokens(&output);
    tracing::debug!(dialect = %cx.dialect, tokens = metadata.token_estimate, "rendered page");

    Ok(RenderedPage { output, metadata, images })
}

/// [`render`] with a default context for `dialect`, returning only the output
pub fn render_dialect(html: &str, source_url: Option<&str>, dialect: Dialect) -> Result<String> {
    render(html, source_url, &FormatContext::new(dialect)).map(|page| page.output)
}

/// The document written in place of a page that could not be fetched or
/// had nothing to convert
pub fn error_document(dialect: Dialect, url: &str, message: &str) -> String {
    match dialect {
        Dialect::Markdown => format!("# Error: {}\n\nSource: {}\n", message, url),
        Dialect::Xml => format!(
            "{}\n<error url=\"{}\">{}</error>\n",
            XML_DECLARATION,
            escape_attr(url),
            escape_text(message)
        ),
        Dialect::Html | Dialect::Raw => format!(
            "<!-- Error fetching content from {} -->\n<h1>{}</h1>\n",
            url.replace("--", "- -"),
            escape_text(message)
        ),
        Dialect::Tagged => format!("URL: {}\n\nError: {}\n\n---\n", url, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <title>Test Page</title>
    <meta name="description" content="A test page">
    <meta property="og:image" content="/og.png">
</head>
<body>
    <nav><a href="/">Home</a></nav>
    <main>
        <h1>Heading</h1>
        <p>Read <a href="/docs">the docs</a>.</p>
        <img src="img/a.png" alt="A">
        <script>track()</script>
    </main>
    <footer>Footer text</footer>
</body>
</html>"#;

    #[test]
    fn test_render_markdown_page() {
        let rendered = render(PAGE, Some("https://example.com/post/"), &FormatContext::default()).unwrap();
        let output = &rendered.output;

        assert!(output.starts_with("---\ntitle: \"Test Page\"\nsource: \"https://example.com/post/\"\n"));
        assert!(output.contains("# Test Page\n\nSource: [https://example.com/post/](https://example.com/post/)"));
        assert!(output.contains("# Heading"));
        assert!(output.contains("Read [the docs](https://example.com/docs)."));
        assert!(output.contains("![A](https://example.com/post/img/a.png)"));
        assert!(!output.contains("Home"));
        assert!(!output.contains("Footer text"));
        assert!(!output.contains("track()"));
    }

    #[test]
    fn test_render_collects_images_and_metadata() {
        let rendered = render(PAGE, Some("https://example.com/post/"), &FormatContext::default()).unwrap();

        assert_eq!(rendered.metadata.title.as_deref(), Some("Test Page"));
        assert_eq!(rendered.metadata.description.as_deref(), Some("A test page"));
        assert_eq!(rendered.metadata.language.as_deref(), Some("en"));
        assert!(rendered.metadata.token_estimate > 0);

        let urls: Vec<&str> = rendered.images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["https://example.com/post/img/a.png", "https://example.com/og.png"]);
    }

    #[test]
    fn test_render_uses_image_map() {
        let cx = FormatContext::builder()
            .image_map([("https://example.com/post/img/a.png".to_string(), "images/example.com/abc.png".to_string())].into())
            .build();
        let rendered = render(PAGE, Some("https://example.com/post/"), &cx).unwrap();
        assert!(rendered.output.contains("![A](images/example.com/abc.png)"));
    }

    #[test]
    fn test_render_strips_attributes_when_asked() {
        let html = r#"<main><p class="lead" data-track="7" onclick="t()">Hi</p></main>"#;

        let kept = render(html, None, &FormatContext::new(Dialect::Raw)).unwrap();
        assert!(kept.output.contains("data-track=\"7\""));

        let cx = FormatContext::builder().dialect(Dialect::Raw).strip_attributes(true).build();
        let stripped = render(html, None, &cx).unwrap();
        assert!(stripped.output.contains("<p class=\"lead\">Hi</p>"), "{}", stripped.output);
        assert!(!stripped.output.contains("onclick"));
    }

    #[rstest]
    #[case("")]
    #[case("   \n\t ")]
    fn test_render_empty_input(#[case] html: &str) {
        assert!(matches!(render(html, None, &FormatContext::default()), Err(ContxtError::NoContent)));
    }

    #[test]
    fn test_render_without_url() {
        let rendered = render("<p>Just text</p>", None, &FormatContext::new(Dialect::Tagged)).unwrap();
        assert_eq!(rendered.output, "Title: No title\n\nContent:\n\np: Just text\n\n---\n");
    }

    #[test]
    fn test_render_invalid_source_url_degrades() {
        let rendered = render(r#"<p><a href="/x">x</a></p>"#, Some("not a url"), &FormatContext::default()).unwrap();
        assert!(rendered.output.contains("[x](/x)"));
        assert_eq!(rendered.metadata.url.as_deref(), Some("not a url"));
    }

    #[rstest]
    #[case(Dialect::Markdown, "# Heading")]
    #[case(Dialect::Xml, "<h1>Heading</h1>")]
    #[case(Dialect::Tagged, "h1: Heading")]
    #[case(Dialect::Html, "<h1>")]
    #[case(Dialect::Raw, "<h1>Heading</h1>")]
    fn test_render_every_dialect(#[case] dialect: Dialect, #[case] expected: &str) {
        let output = render_dialect(PAGE, Some("https://example.com"), dialect).unwrap();
        assert!(output.contains(expected), "{}: {}", dialect, output);
        assert_eq!(output, render_dialect(PAGE, Some("https://example.com"), dialect).unwrap());
    }

    #[rstest]
    #[case(Dialect::Markdown, "# Error: timed out\n\nSource: https://x.org\n")]
    #[case(Dialect::Xml, "<?xml version=\"1.0\" ?>\n<error url=\"https://x.org\">timed out</error>\n")]
    #[case(Dialect::Html, "<!-- Error fetching content from https://x.org -->\n<h1>timed out</h1>\n")]
    #[case(Dialect::Tagged, "URL: https://x.org\n\nError: timed out\n\n---\n")]
    fn test_error_document(#[case] dialect: Dialect, #[case] expected: &str) {
        assert_eq!(error_document(dialect, "https://x.org", "timed out"), expected);
    }
}
