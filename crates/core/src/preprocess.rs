use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Tags whose content never reaches the output
const UNWANTED_TAGS: &str = "script, style, noscript, iframe, svg, canvas, template";

/// Page chrome that surrounds the content rather than being part of it
const CHROME_TAGS: &str = "header, footer, nav, aside, form, button, input";

/// Attributes kept when [`PreprocessConfig::strip_attributes`] is on
const KEPT_ATTRIBUTES: [&str; 14] = [
    "href",
    "src",
    "alt",
    "title",
    "id",
    "class",
    "role",
    "aria-label",
    "width",
    "height",
    "lang",
    "colspan",
    "rowspan",
    "datetime",
];

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static HIDDEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").unwrap());

/// Configuration for HTML preprocessing
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Whether to remove script, style, noscript, iframe, svg, canvas and template tags
    pub remove_unwanted: bool,
    /// Whether to remove header, footer, nav, aside, form, button and input tags
    pub remove_chrome: bool,
    /// Whether to remove elements hidden with inline styles
    pub remove_hidden: bool,
    /// Whether to drop every attribute outside a small allowlist
    pub strip_attributes: bool,
    /// Whether to convert relative URLs to absolute
    pub convert_urls: bool,
    /// Base URL for converting relative URLs
    pub base_url: Option<Url>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            remove_unwanted: true,
            remove_chrome: true,
            remove_hidden: true,
            strip_attributes: false,
            convert_urls: true,
            base_url: None,
        }
    }
}

/// Preprocess HTML by removing unwanted elements and comments
///
/// Whitespace is left alone so `<pre>` blocks survive intact.
pub fn preprocess_html(html: &str, config: &PreprocessConfig) -> String {
    let mut processed = remove_comments(html);

    let mut selectors = Vec::new();
    if config.remove_unwanted {
        selectors.push(UNWANTED_TAGS);
    }
    if config.remove_chrome {
        selectors.push(CHROME_TAGS);
    }
    if !selectors.is_empty() {
        processed = remove_tags(&processed, &selectors.join(", "));
    }

    if config.remove_hidden {
        processed = remove_hidden_elements(&processed);
    }

    if config.strip_attributes {
        processed = strip_attributes(&processed);
    }

    if config.convert_urls
        && let Some(base_url) = &config.base_url
    {
        processed = convert_relative_urls(&processed, base_url);
    }

    processed
}

/// Run a single-pass rewrite, falling back to the input if lol_html rejects it
fn rewrite(html: &str, handlers: Vec<(std::borrow::Cow<'_, lol_html::Selector>, lol_html::ElementContentHandlers<'_>)>) -> String {
    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings { element_content_handlers: handlers, ..Default::default() },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    match rewriter.write(html.as_bytes()) {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    match rewriter.end() {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    if output.is_empty() { html.to_string() } else { output }
}

/// Remove every element matching `selector` together with its content
fn remove_tags(html: &str, selector: &str) -> String {
    rewrite(
        html,
        vec![lol_html::element!(selector, |el| {
            el.remove();
            Ok(())
        })],
    )
}

/// Remove HTML comments from the document
fn remove_comments(html: &str) -> String {
    COMMENT_RE.replace_all(html, "").to_string()
}

/// Remove elements with display:none or visibility:hidden styles
fn remove_hidden_elements(html: &str) -> String {
    rewrite(
        html,
        vec![lol_html::element!("[style]", |el| {
            if let Some(style) = el.get_attribute("style")
                && HIDDEN_RE.is_match(&style)
            {
                el.remove();
            }
            Ok(())
        })],
    )
}

/// Drop every attribute that is not in [`KEPT_ATTRIBUTES`]
fn strip_attributes(html: &str) -> String {
    rewrite(
        html,
        vec![lol_html::element!("*", |el| {
            let dropped: Vec<String> = el
                .attributes()
                .iter()
                .map(|attr| attr.name())
                .filter(|name| !KEPT_ATTRIBUTES.contains(&name.as_str()))
                .collect();
            for name in dropped {
                el.remove_attribute(&name);
            }
            Ok(())
        })],
    )
}

/// Convert relative URLs to absolute URLs
pub fn convert_relative_urls(html: &str, base_url: &Url) -> String {
    rewrite(
        html,
        vec![
            lol_html::element!("a[href]", |el| {
                if let Some(href) = el.get_attribute("href")
                    && let Ok(absolute) = base_url.join(&href)
                {
                    el.set_attribute("href", absolute.as_str()).ok();
                }
                Ok(())
            }),
            lol_html::element!("img[src]", |el| {
                if let Some(src) = el.get_attribute("src")
                    && let Ok(absolute) = base_url.join(&src)
                {
                    el.set_attribute("src", absolute.as_str()).ok();
                }
                Ok(())
            }),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_unwanted_tags() {
        let html = r#"
            <html>
                <head><script>alert('test');</script><style>body{color:red;}</style></head>
                <body>
                    <noscript>Enable JavaScript</noscript>
                    <iframe src="https://example.com"></iframe>
                    <svg><rect width="100" height="100"/></svg>
                    <p>Content</p>
                </body>
            </html>
        "#;

        let config = PreprocessConfig { remove_chrome: false, ..Default::default() };
        let result = preprocess_html(html, &config);
        assert!(!result.contains("<script"));
        assert!(!result.contains("<style"));
        assert!(!result.contains("<noscript"));
        assert!(!result.contains("<iframe"));
        assert!(!result.contains("<svg"));
        assert!(result.contains("<p>Content</p>"));

        assert!(!result.contains("alert"), "Script content should be removed");
        assert!(!result.contains("color:red"), "Style content should be removed");
        assert!(!result.contains("rect"), "SVG content should be removed");
    }

    #[test]
    fn test_remove_chrome() {
        let html = r#"
            <body>
                <header>Site header</header>
                <nav><a href="/">Home</a></nav>
                <main><p>Article</p><button>Share</button></main>
                <aside>Related</aside>
                <footer>Copyright</footer>
            </body>
        "#;

        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(!result.contains("Site header"));
        assert!(!result.contains("Home"));
        assert!(!result.contains("Share"));
        assert!(!result.contains("Related"));
        assert!(!result.contains("Copyright"));
        assert!(result.contains("Article"));

        let keep = PreprocessConfig { remove_chrome: false, ..Default::default() };
        assert!(preprocess_html(html, &keep).contains("Site header"));
    }

    #[test]
    fn test_remove_comments() {
        let html = "<p>Visible</p><!-- one --><!--\n multi\n line\n--><p>content</p>";
        let result = remove_comments(html);
        assert!(!result.contains("<!--"));
        assert!(!result.contains("multi"));
        assert_eq!(result, "<p>Visible</p><p>content</p>");
    }

    #[test]
    fn test_whitespace_preserved_in_pre() {
        let html = "<pre><code>fn main() {\n    body();\n}</code></pre>";
        let result = preprocess_html(html, &PreprocessConfig::default());
        assert!(result.contains("fn main() {\n    body();\n}"));
    }

    #[test]
    fn test_convert_relative_urls() {
        let base = Url::parse("https://example.com/blog/").unwrap();
        let html = r#"
            <a href="/about">About</a>
            <a href="post.html">Post</a>
            <img src="image.jpg" />
        "#;

        let result = convert_relative_urls(html, &base);
        assert!(result.contains("href=\"https://example.com/about\""));
        assert!(result.contains("href=\"https://example.com/blog/post.html\""));
        assert!(result.contains("src=\"https://example.com/blog/image.jpg\""));
    }

    #[test]
    fn test_remove_hidden_elements() {
        let html = r#"
            <div style="display:none">Hidden content</div>
            <div style="visibility: hidden">Invisible content</div>
            <div style="color: red">Visible content</div>
        "#;

        let result = remove_hidden_elements(html);
        assert!(!result.contains("Hidden content"));
        assert!(!result.contains("Invisible content"));
        assert!(result.contains("Visible content"));
    }

    #[test]
    fn test_strip_attributes() {
        let html = r#"<a href="/x" onclick="track()" data-id="7" class="link">X</a>"#;
        let config = PreprocessConfig { strip_attributes: true, ..Default::default() };
        let result = preprocess_html(html, &config);
        assert!(result.contains(r#"href="/x""#));
        assert!(result.contains(r#"class="link""#));
        assert!(!result.contains("onclick"));
        assert!(!result.contains("data-id"));
    }
}
