//! XML output that keeps the page hierarchy.
//!
//! The walk mirrors the content subtree into an [`XmlTree`], an arena of
//! sanitized elements. Empty elements are pruned bottom-up once the walk is
//! done and the tree is printed with two-space indentation. Building,
//! pruning and printing are all iterative.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::FormatContext;
use crate::dom::{DomTree, NodeId};
use crate::formatters::{Formatter, PageParts};
use crate::postprocess::merge_inline_run;
use crate::traverse::{ElementView, Emitter, RunView, Visit, walk};

static INVALID_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]").unwrap());

/// Declaration line every XML document starts with
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" ?>"#;

/// Tags left out of XML output on top of the ones every dialect skips
const XML_SKIPPED_TAGS: [&str; 8] = ["svg", "canvas", "meta", "link", "input", "button", "form", "template"];

/// Attributes copied from HTML elements
const IMPORTANT_ATTRIBUTES: [&str; 8] = ["id", "class", "href", "src", "alt", "title", "aria-label", "role"];

/// Elements kept even when they end up with no content
const KEEP_WHEN_EMPTY: [&str; 3] = ["img", "br", "hr"];

pub type XmlId = usize;

/// Content of an XML element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    Element(XmlId),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
    removed: bool,
}

/// Arena-backed XML element tree
///
/// Elements are appended after their parent, so every child id is greater
/// than its parent's id.
#[derive(Debug, Clone)]
pub struct XmlTree {
    elements: Vec<XmlElement>,
}

impl XmlTree {
    /// A tree holding only the root element `name`
    pub fn new(name: &str) -> Self {
        Self { elements: vec![XmlElement::named(name)] }
    }

    pub fn root(&self) -> XmlId {
        0
    }

    /// Append a child element; the name is sanitized
    pub fn add_element(&mut self, parent: XmlId, name: &str) -> XmlId {
        let id = self.elements.len();
        self.elements.push(XmlElement::named(&sanitize_tag_name(name)));
        if let Some(p) = self.elements.get_mut(parent) {
            p.children.push(XmlChild::Element(id));
        }
        id
    }

    /// Append a child element holding `text`
    pub fn add_text_element(&mut self, parent: XmlId, name: &str, text: &str) -> XmlId {
        let id = self.add_element(parent, name);
        self.add_text(id, text);
        id
    }

    /// Append character data; control characters are dropped
    pub fn add_text(&mut self, parent: XmlId, text: &str) {
        let text = strip_control_chars(text);
        if text.is_empty() {
            return;
        }
        if let Some(p) = self.elements.get_mut(parent) {
            p.children.push(XmlChild::Text(text));
        }
    }

    /// Set an attribute; the name is sanitized
    pub fn set_attr(&mut self, id: XmlId, name: &str, value: &str) {
        if let Some(el) = self.elements.get_mut(id) {
            el.attributes.push((sanitize_attr_name(name), strip_control_chars(value)));
        }
    }

    pub fn get(&self, id: XmlId) -> Option<&XmlElement> {
        self.elements.get(id).filter(|el| !el.removed)
    }

    /// Remove elements created after `after` that hold no text and no
    /// remaining child elements, except `img`, `br` and `hr`
    ///
    /// Ids are visited from last to first, so children are settled before
    /// their parent is looked at.
    pub fn prune_empty(&mut self, after: XmlId) -> usize {
        let mut pruned = 0;
        for id in (after + 1..self.elements.len()).rev() {
            let empty = {
                let el = &self.elements[id];
                !KEEP_WHEN_EMPTY.contains(&el.name.as_str())
                    && el.children.iter().all(|child| match child {
                        XmlChild::Text(_) => false,
                        XmlChild::Element(c) => self.elements[*c].removed,
                    })
            };
            if empty {
                self.elements[id].removed = true;
                pruned += 1;
            }
        }
        pruned
    }

    /// Pretty-print with the XML declaration and two-space indentation
    ///
    /// An element whose only child is text sits on one line; an element
    /// with no children is self-closed.
    pub fn to_pretty_string(&self) -> String {
        enum Step {
            Open(XmlId, usize),
            Close(XmlId, usize),
            Text(usize, usize, usize),
        }

        let mut out = String::from(XML_DECLARATION);
        out.push('\n');
        let mut steps = vec![Step::Open(self.root(), 0)];

        while let Some(step) = steps.pop() {
            match step {
                Step::Open(id, depth) => {
                    let Some(el) = self.get(id) else {
                        continue;
                    };
                    let indent = "  ".repeat(depth);
                    let children: Vec<&XmlChild> = el
                        .children
                        .iter()
                        .filter(|c| match c {
                            XmlChild::Element(c) => self.get(*c).is_some(),
                            XmlChild::Text(_) => true,
                        })
                        .collect();

                    match children.as_slice() {
                        [] => out.push_str(&format!("{}<{}{}/>\n", indent, el.name, attributes(el))),
                        [XmlChild::Text(text)] => out.push_str(&format!(
                            "{}<{}{}>{}</{}>\n",
                            indent,
                            el.name,
                            attributes(el),
                            escape_text(text),
                            el.name
                        )),
                        _ => {
                            out.push_str(&format!("{}<{}{}>\n", indent, el.name, attributes(el)));
                            steps.push(Step::Close(id, depth));
                            for (i, child) in el.children.iter().enumerate().rev() {
                                match child {
                                    XmlChild::Element(c) => steps.push(Step::Open(*c, depth + 1)),
                                    XmlChild::Text(_) => steps.push(Step::Text(id, i, depth + 1)),
                                }
                            }
                        }
                    }
                }
                Step::Close(id, depth) => {
                    if let Some(el) = self.get(id) {
                        out.push_str(&format!("{}</{}>\n", "  ".repeat(depth), el.name));
                    }
                }
                Step::Text(id, index, depth) => {
                    if let Some(XmlChild::Text(text)) = self.elements[id].children.get(index) {
                        out.push_str(&format!("{}{}\n", "  ".repeat(depth), escape_text(text)));
                    }
                }
            }
        }

        out
    }
}

impl XmlElement {
    fn named(name: &str) -> Self {
        Self { name: name.to_string(), attributes: Vec::new(), children: Vec::new(), removed: false }
    }
}

fn attributes(el: &XmlElement) -> String {
    el.attributes
        .iter()
        .map(|(name, value)| format!(" {}=\"{}\"", name, escape_attr(value)))
        .collect()
}

/// Make `name` a valid XML element name
///
/// Characters outside `[A-Za-z0-9_-]` become `_`; a name that does not then
/// start with a letter or underscore gets a `tag_` prefix.
pub fn sanitize_tag_name(name: &str) -> String {
    if name.is_empty() {
        return "tag".to_string();
    }
    let sanitized = INVALID_NAME_CHARS.replace_all(name, "_");
    if sanitized.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        sanitized.into_owned()
    } else {
        format!("tag_{}", sanitized)
    }
}

/// Make `name` a valid XML attribute name; `class` and `for` are renamed
pub fn sanitize_attr_name(name: &str) -> String {
    match name {
        "class" => return "class_attr".to_string(),
        "for" => return "for_attr".to_string(),
        _ => {}
    }
    let sanitized = INVALID_NAME_CHARS.replace_all(name, "_");
    if sanitized.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        sanitized.into_owned()
    } else {
        format!("attr_{}", sanitized)
    }
}

/// Escape character data
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape an attribute value
pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;").replace('\'', "&#x27;")
}

/// Drop characters XML 1.0 cannot carry; tab, newline and carriage return stay
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{7f}'))
        .collect()
}

/// Convert the subtree at `root` to an XML document rooted at `<body>`
pub fn convert(tree: &DomTree, root: NodeId, cx: &FormatContext) -> String {
    let mut xml = XmlTree::new("body");
    let body = xml.root();
    mirror_body(tree, root, cx, &mut xml, body);
    xml.to_pretty_string()
}

/// Mirror the content subtree into `xml` under `parent`, then prune
fn mirror_body(tree: &DomTree, root: NodeId, cx: &FormatContext, xml: &mut XmlTree, parent: XmlId) {
    let mut emitter = XmlEmitter { cx, root, xml, stack: vec![parent] };
    walk(tree, root, cx.preformatted, &mut emitter);
    let pruned = emitter.xml.prune_empty(parent);
    tracing::debug!(pruned, "pruned empty xml elements");
}

/// Walk strategy that copies elements into an [`XmlTree`]
pub struct XmlEmitter<'a> {
    cx: &'a FormatContext,
    root: NodeId,
    xml: &'a mut XmlTree,
    /// Open XML elements, innermost last
    stack: Vec<XmlId>,
}

impl XmlEmitter<'_> {
    fn parent(&self) -> XmlId {
        self.stack.last().copied().unwrap_or(0)
    }

    /// Create the XML counterpart of `el` with its important attributes
    fn open(&mut self, el: &ElementView<'_>) -> XmlId {
        let parent = self.parent();
        let id = self.xml.add_element(parent, el.tag());
        let Some(node) = el.node() else {
            return id;
        };
        for (name, value) in &node.attributes {
            if !IMPORTANT_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            let value = match name.as_str() {
                "href" => self.cx.resolve(value),
                "src" => self.cx.image_target(value),
                _ => value.clone(),
            };
            self.xml.set_attr(id, name, &value);
        }
        id
    }
}

impl Emitter for XmlEmitter<'_> {
    fn element(&mut self, el: &ElementView<'_>) -> Visit {
        if el.id == self.root || matches!(el.tag(), "html" | "body") {
            return Visit::Descend;
        }
        if XML_SKIPPED_TAGS.contains(&el.tag()) {
            return Visit::Skip;
        }
        let id = self.open(el);
        self.stack.push(id);
        Visit::DescendAndClose
    }

    fn image(&mut self, el: &ElementView<'_>) -> Visit {
        self.open(el);
        Visit::Consumed
    }

    fn line_break(&mut self, el: &ElementView<'_>) -> Visit {
        self.open(el);
        Visit::Consumed
    }

    fn rule(&mut self, el: &ElementView<'_>) -> Visit {
        self.open(el);
        Visit::Consumed
    }

    fn void(&mut self, el: &ElementView<'_>) -> Visit {
        if XML_SKIPPED_TAGS.contains(&el.tag()) {
            return Visit::Skip;
        }
        self.open(el);
        Visit::Consumed
    }

    fn inline_run(&mut self, run: &RunView<'_>) {
        let Some(&first) = run.ids.first() else {
            return;
        };
        let text = merge_inline_run(run.ids.iter().map(|&id| run.tree.visible_text(id)));
        let view = ElementView { tree: run.tree, id: first, depth: run.depth, pre: false };
        let id = self.open(&view);
        self.xml.add_text(id, &text);
    }

    fn text(&mut self, text: &str, _pre: bool, _depth: usize) {
        let parent = self.parent();
        self.xml.add_text(parent, text);
    }

    fn close(&mut self, _el: &ElementView<'_>) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }
}

/// XML formatter bound to one conversion context
pub struct XmlFormatter<'a> {
    cx: &'a FormatContext,
}

impl<'a> XmlFormatter<'a> {
    pub fn new(cx: &'a FormatContext) -> Self {
        Self { cx }
    }
}

impl Formatter for XmlFormatter<'_> {
    fn body(&self, tree: &DomTree, root: NodeId) -> String {
        convert(tree, root, self.cx)
    }

    fn page(&self, parts: &PageParts<'_>) -> String {
        let metadata = parts.metadata;
        let mut xml = XmlTree::new("content");
        let content = xml.root();

        let meta = xml.add_element(content, "metadata");
        xml.add_text_element(meta, "title", metadata.display_title());
        xml.add_text_element(meta, "url", metadata.url.as_deref().unwrap_or(""));

        if metadata.has_open_graph() {
            let og = xml.add_element(meta, "open_graph");
            for (name, value) in [
                ("title", &metadata.og_title),
                ("description", &metadata.og_description),
                ("image", &metadata.og_image),
            ] {
                if let Some(value) = value {
                    xml.add_text_element(og, name, value);
                }
            }
        }

        let body = xml.add_element(content, "body");
        mirror_body(parts.tree, parts.root, self.cx, &mut xml, body);

        if self.cx.include_images && !parts.images.is_empty() {
            let images = xml.add_element(content, "images");
            for img in parts.images {
                let image = xml.add_element(images, "image");
                match self.cx.image_map.get(&img.url) {
                    Some(path) => xml.add_text_element(image, "path", path),
                    None => xml.add_text_element(image, "url", &img.url),
                };
                xml.add_text_element(image, "alt", img.alt_text());
                if img.width.is_some() || img.height.is_some() {
                    let dimensions = xml.add_element(image, "dimensions");
                    if let Some(width) = &img.width {
                        xml.set_attr(dimensions, "width", width);
                    }
                    if let Some(height) = &img.height {
                        xml.set_attr(dimensions, "height", height);
                    }
                }
            }
        }

        xml.to_pretty_string()
    }
}
