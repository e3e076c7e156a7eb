//! Formatted and raw HTML output.
//!
//! The formatted variant re-serializes the cleaned content tree with one
//! block per line and two-space indentation; the raw variant serializes it
//! compactly, as parsed. Neither recurses.

use crate::FormatContext;
use crate::classify::{is_block_level, is_void};
use crate::dom::{DomTree, NodeId, NodeKind};
use crate::formatters::{Formatter, PageParts};
use crate::postprocess::normalize_whitespace;
use crate::traverse::{ElementView, Emitter, Visit, walk};

/// Convert the subtree at `root` to indented HTML
pub fn convert(tree: &DomTree, root: NodeId, cx: &FormatContext) -> String {
    let mut emitter = HtmlEmitter::new(cx);
    walk(tree, root, cx.preformatted, &mut emitter);
    emitter.finish()
}

/// Serialize the subtree at `root` compactly, without reformatting
pub fn convert_raw(tree: &DomTree, root: NodeId, cx: &FormatContext) -> String {
    enum Step {
        Open(NodeId),
        Close(NodeId),
    }

    let mut out = String::new();
    let mut steps = vec![Step::Open(root)];

    while let Some(step) = steps.pop() {
        match step {
            Step::Open(id) => {
                let Some(node) = tree.get_node(id) else {
                    continue;
                };
                match node.kind {
                    NodeKind::Text => out.push_str(&escape_text(&node.text)),
                    NodeKind::Document => steps.extend(node.child_ids.iter().rev().map(|&c| Step::Open(c))),
                    NodeKind::Element => {
                        out.push_str(&start_tag(tree, id, cx));
                        if !is_void(&node.tag) {
                            steps.push(Step::Close(id));
                            steps.extend(node.child_ids.iter().rev().map(|&c| Step::Open(c)));
                        }
                    }
                }
            }
            Step::Close(id) => out.push_str(&format!("</{}>", tree.tag(id))),
        }
    }

    out
}

/// Escape character data
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape a double-quoted attribute value
pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// `<tag a="v">`, with the image map applied to `<img src>`
fn start_tag(tree: &DomTree, id: NodeId, cx: &FormatContext) -> String {
    let Some(node) = tree.get_node(id) else {
        return String::new();
    };
    let mut tag = format!("<{}", node.tag);
    for (name, value) in &node.attributes {
        let value = if node.tag == "img" && name == "src" { cx.image_target(value) } else { value.clone() };
        tag.push_str(&format!(" {}=\"{}\"", name, escape_attr(&value)));
    }
    tag.push('>');
    tag
}

/// Whether an ancestor of `id` is a `<pre>`
fn inside_pre(tree: &DomTree, id: NodeId) -> bool {
    let mut current = tree.get_node(id).and_then(|n| n.parent_id);
    while let Some(pid) = current {
        if tree.tag(pid) == "pre" {
            return true;
        }
        current = tree.get_node(pid).and_then(|n| n.parent_id);
    }
    false
}

/// The text of `id` when its only child is a text node
fn sole_text(tree: &DomTree, id: NodeId) -> Option<&str> {
    match tree.children(id) {
        [only] => tree.get_node(*only).filter(|n| n.is_text()).map(|n| n.text.as_str()),
        _ => None,
    }
}

/// Walk strategy producing indented HTML lines
pub struct HtmlEmitter<'a> {
    cx: &'a FormatContext,
    lines: Vec<String>,
}

impl<'a> HtmlEmitter<'a> {
    pub fn new(cx: &'a FormatContext) -> Self {
        Self { cx, lines: Vec::new() }
    }

    pub fn finish(self) -> String {
        self.lines.join("\n")
    }

    fn indent(depth: usize) -> String {
        "  ".repeat(depth)
    }

    /// Elements in pre mode: start and end tags unindented, text verbatim
    fn preformatted(&mut self, el: &ElementView<'_>) -> Visit {
        let indent = if el.tag() == "pre" && !inside_pre(el.tree, el.id) { Self::indent(el.depth) } else { String::new() };
        self.lines.push(format!("{}{}", indent, start_tag(el.tree, el.id, self.cx)));
        if is_void(el.tag()) {
            return Visit::Consumed;
        }
        if let Some(text) = sole_text(el.tree, el.id) {
            self.lines.push(text.to_string());
            self.lines.push(format!("</{}>", el.tag()));
            return Visit::Consumed;
        }
        Visit::DescendAndClose
    }
}

impl Emitter for HtmlEmitter<'_> {
    fn element(&mut self, el: &ElementView<'_>) -> Visit {
        if el.pre {
            return self.preformatted(el);
        }

        let indent = Self::indent(el.depth);
        let start = start_tag(el.tree, el.id, self.cx);

        if is_void(el.tag()) {
            self.lines.push(format!("{}{}", indent, start));
            return Visit::Consumed;
        }

        if !is_block_level(el.tag())
            && let Some(text) = sole_text(el.tree, el.id)
        {
            let text = escape_text(&normalize_whitespace(text));
            self.lines.push(format!("{}{}{}</{}>", indent, start, text, el.tag()));
            return Visit::Consumed;
        }

        self.lines.push(format!("{}{}", indent, start));
        Visit::DescendAndClose
    }

    fn merges_runs(&self) -> bool {
        false
    }

    fn text(&mut self, text: &str, pre: bool, depth: usize) {
        if pre {
            self.lines.push(text.to_string());
        } else {
            self.lines.push(format!("{}{}", Self::indent(depth), escape_text(text)));
        }
    }

    fn close(&mut self, el: &ElementView<'_>) {
        if el.pre {
            self.lines.push(format!("</{}>", el.tag()));
        } else {
            self.lines.push(format!("{}</{}>", Self::indent(el.depth), el.tag()));
        }
    }
}

/// Text safe to place inside an HTML comment
fn comment_text(text: &str) -> String {
    text.replace("--", "- -")
}

/// `<!-- Title -->` / `<!-- Source -->` header lines followed by a blank line
fn comment_header(parts: &PageParts<'_>) -> String {
    format!(
        "<!-- Title: {} -->\n<!-- Source: {} -->\n\n",
        comment_text(parts.metadata.display_title()),
        comment_text(parts.metadata.url.as_deref().unwrap_or(""))
    )
}

/// Images section appended when images were requested
fn images_section(parts: &PageParts<'_>, cx: &FormatContext) -> String {
    if !cx.include_images || parts.images.is_empty() {
        return String::new();
    }
    let mut section = String::from("\n\n<h2>Images</h2>\n");
    for img in parts.images {
        section.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\" />\n",
            escape_attr(&cx.image_target(&img.url)),
            escape_attr(img.alt_text())
        ));
    }
    section
}

/// Formatted-HTML formatter bound to one conversion context
pub struct HtmlFormatter<'a> {
    cx: &'a FormatContext,
}

impl<'a> HtmlFormatter<'a> {
    pub fn new(cx: &'a FormatContext) -> Self {
        Self { cx }
    }
}

impl Formatter for HtmlFormatter<'_> {
    fn body(&self, tree: &DomTree, root: NodeId) -> String {
        convert(tree, root, self.cx)
    }

    fn page(&self, parts: &PageParts<'_>) -> String {
        format!(
            "{}{}{}",
            comment_header(parts),
            self.body(parts.tree, parts.root),
            images_section(parts, self.cx)
        )
    }
}

/// Raw-HTML formatter: the cleaned content as parsed, under the comment header
pub struct RawFormatter<'a> {
    cx: &'a FormatContext,
}

impl<'a> RawFormatter<'a> {
    pub fn new(cx: &'a FormatContext) -> Self {
        Self { cx }
    }
}

impl Formatter for RawFormatter<'_> {
    fn body(&self, tree: &DomTree, root: NodeId) -> String {
        convert_raw(tree, root, self.cx)
    }

    fn page(&self, parts: &PageParts<'_>) -> String {
        format!("{}{}", comment_header(parts), self.body(parts.tree, parts.root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;

    fn html(source: &str) -> String {
        let tree = DomTree::parse(source);
        convert(&tree, tree.main_content(), &FormatContext::default())
    }

    #[test]
    fn test_block_and_inline_layout() {
        let result = html(r#"<main><div><p>Hello <b>world</b></p><span class="k">v</span><img src="a.png"></div></main>"#);
        assert_eq!(
            result,
            "<main>\n  <div>\n    <p>\n      Hello\n      <b>world</b>\n    </p>\n    <span class=\"k\">v</span>\n    <img src=\"a.png\">\n  </div>\n</main>"
        );
    }

    #[test]
    fn test_pre_is_verbatim() {
        let result = html("<main><div><pre>a\n  b</pre></div></main>");
        assert_eq!(result, "<main>\n  <div>\n    <pre>\na\n  b\n</pre>\n  </div>\n</main>");
    }

    #[test]
    fn test_escaping() {
        let result = html(r#"<main><span title="a&quot;b">1 &lt; 2</span></main>"#);
        assert_eq!(result, "<main>\n  <span title=\"a&quot;b\">1 &lt; 2</span>\n</main>");
    }

    #[test]
    fn test_adjacent_spans_stay_separate() {
        let result = html("<main><span>a</span><span>b</span></main>");
        assert_eq!(result, "<main>\n  <span>a</span>\n  <span>b</span>\n</main>");
    }

    #[test]
    fn test_raw_serialization() {
        let tree = DomTree::parse(r#"<main><p class="x">Hi <br>there &amp; you</p></main>"#);
        let raw = convert_raw(&tree, tree.main_content(), &FormatContext::default());
        assert_eq!(raw, r#"<main><p class="x">Hi <br>there &amp; you</p></main>"#);
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 5_000;
        let source = format!("{}{}", "<div><p>Text</p>".repeat(depth), "</div>".repeat(depth));
        assert_eq!(html(&source).matches("Text").count(), depth);

        let tree = DomTree::parse(&source);
        let raw = convert_raw(&tree, tree.main_content(), &FormatContext::default());
        assert_eq!(raw.matches("<p>Text</p>").count(), depth);
    }

    #[test]
    fn test_page_header_and_images() {
        let tree = DomTree::parse("<main><p>Body</p></main>");
        let cx = FormatContext::builder().include_images(true).build();
        let metadata = Metadata {
            title: Some("Page".to_string()),
            url: Some("https://example.com".to_string()),
            ..Default::default()
        };
        let images = vec![crate::images::ImageRef {
            url: "https://example.com/a.png".to_string(),
            alt: None,
            width: None,
            height: None,
        }];
        let parts = PageParts { tree: &tree, root: tree.main_content(), metadata: &metadata, images: &images };

        assert_eq!(
            HtmlFormatter::new(&cx).page(&parts),
            "<!-- Title: Page -->\n<!-- Source: https://example.com -->\n\n<main>\n  <p>\n    Body\n  </p>\n</main>\
             \n\n<h2>Images</h2>\n<img src=\"https://example.com/a.png\" alt=\"Image\" />\n"
        );
        assert_eq!(
            RawFormatter::new(&cx).page(&parts),
            "<!-- Title: Page -->\n<!-- Source: https://example.com -->\n\n<main><p>Body</p></main>"
        );
    }
}
