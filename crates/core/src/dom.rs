//! Arena DOM used by the conversion engine.
//!
//! [`DomTree`] stores every node in one `Vec`, with parent and child links
//! expressed as indices. Building, walking, and dropping the tree never
//! recurses, so documents with thousands of nested elements are safe.
//!
//! A tree is normally built from a `scraper` parse via [`DomTree::parse`],
//! but any parser can feed it through [`DomTree::push_element`] and
//! [`DomTree::push_text`].

use indexmap::IndexMap;
use scraper::{Html, Node};
use std::collections::HashMap;

use crate::classify::is_skipped;
use crate::parse::Document;
use crate::postprocess::normalize_whitespace;

/// Index of a node inside a [`DomTree`].
pub type NodeId = usize;

/// The kind of a node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The synthetic root every tree starts with
    Document,
    /// An element such as `<div>`
    Element,
    /// A run of character data
    Text,
}

/// A node in the DOM tree
#[derive(Debug, Clone)]
pub struct DomNode {
    /// Element, text, or the document root
    pub kind: NodeKind,
    /// Lowercase tag name (empty for text and the root)
    pub tag: String,
    /// Attributes in source order (empty for text)
    pub attributes: IndexMap<String, String>,
    /// Character data (text nodes only)
    pub text: String,
    /// Parent node ID (None for the root)
    pub parent_id: Option<NodeId>,
    /// Child node IDs in document order
    pub child_ids: Vec<NodeId>,
}

impl DomNode {
    /// Whether this node is an element
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Whether this node is a text run
    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    /// Get an attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Check whether the whitespace-separated `class` attribute contains `class`
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

/// A DOM tree stored as an arena of nodes
///
/// Every child is created after its parent, so a child's ID is always greater
/// than its parent's. Content flags (`has_text`, `has_image`) are maintained
/// incrementally as nodes are pushed.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
    has_text: Vec<bool>,
    has_image: Vec<bool>,
}

impl DomTree {
    /// Create a tree holding only the document root
    pub fn new() -> Self {
        let root = DomNode {
            kind: NodeKind::Document,
            tag: String::new(),
            attributes: IndexMap::new(),
            text: String::new(),
            parent_id: None,
            child_ids: Vec::new(),
        };
        Self { nodes: vec![root], has_text: vec![false], has_image: vec![false] }
    }

    /// Parse an HTML string into a tree
    pub fn parse(html: &str) -> Self {
        Self::from_html(&Html::parse_document(html))
    }

    /// Build a tree from an already parsed [`Document`]
    pub fn from_document(doc: &Document) -> Self {
        Self::from_html(doc.html())
    }

    /// Build a tree from a `scraper` parse
    ///
    /// `descendants()` yields nodes in pre-order, so every parent is already
    /// in the arena when its children arrive. Comments, doctypes, and
    /// processing instructions are dropped.
    pub fn from_html(html: &Html) -> Self {
        let mut tree = Self::new();
        let root = html.tree.root();
        let mut ids = HashMap::new();
        ids.insert(root.id(), tree.root());

        for node in root.descendants().skip(1) {
            let Some(parent) = node.parent().and_then(|p| ids.get(&p.id()).copied()) else {
                continue;
            };

            match node.value() {
                Node::Element(element) => {
                    let attrs = element.attrs().map(|(k, v)| (k.to_string(), v.to_string()));
                    let id = tree.push_element(parent, element.name(), attrs);
                    ids.insert(node.id(), id);
                }
                Node::Text(text) => {
                    tree.push_text(parent, &text.text);
                }
                Node::Fragment => {
                    ids.insert(node.id(), parent);
                }
                _ => {}
            }
        }

        tree
    }

    /// The document root
    pub fn root(&self) -> NodeId {
        0
    }

    fn push(&mut self, parent: NodeId, node: DomNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.has_text.push(false);
        self.has_image.push(false);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.child_ids.push(id);
        }
        id
    }

    /// Append an element under `parent` and return its ID
    pub fn push_element<I, K, V>(&mut self, parent: NodeId, tag: &str, attributes: I) -> NodeId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tag = tag.to_lowercase();
        let is_image = tag == "img";
        let node = DomNode {
            kind: NodeKind::Element,
            tag,
            attributes: attributes.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            text: String::new(),
            parent_id: Some(parent),
            child_ids: Vec::new(),
        };
        let id = self.push(parent, node);
        if is_image {
            self.mark_ancestors(id, |tree| &mut tree.has_image);
        }
        id
    }

    /// Append a text node under `parent` and return its ID
    pub fn push_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let has_content = !text.trim().is_empty();
        let node = DomNode {
            kind: NodeKind::Text,
            tag: String::new(),
            attributes: IndexMap::new(),
            text: text.to_string(),
            parent_id: Some(parent),
            child_ids: Vec::new(),
        };
        let id = self.push(parent, node);
        if has_content {
            self.mark_ancestors(id, |tree| &mut tree.has_text);
        }
        id
    }

    /// Set a flag on `id` and its ancestors, stopping at the first ancestor
    /// that already has it
    fn mark_ancestors(&mut self, id: NodeId, flags: fn(&mut Self) -> &mut Vec<bool>) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let flag = &mut flags(self)[node_id];
            if *flag {
                break;
            }
            *flag = true;
            current = self.nodes[node_id].parent_id;
        }
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id)
    }

    /// Child IDs of a node, empty for unknown IDs
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.child_ids.as_slice()).unwrap_or(&[])
    }

    /// Tag name of a node, empty for text, the root, and unknown IDs
    pub fn tag(&self, id: NodeId) -> &str {
        self.nodes.get(id).map(|n| n.tag.as_str()).unwrap_or("")
    }

    /// Attribute of a node
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(id)?.attr(name)
    }

    /// Whether the subtree rooted at `id` contains non-whitespace text
    pub fn has_text(&self, id: NodeId) -> bool {
        self.has_text.get(id).copied().unwrap_or(false)
    }

    /// Whether the subtree rooted at `id` contains an `<img>`
    pub fn has_image(&self, id: NodeId) -> bool {
        self.has_image.get(id).copied().unwrap_or(false)
    }

    /// Iterate over a subtree in document order, starting with `id` itself
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let stack = if id < self.nodes.len() { vec![id] } else { Vec::new() };
        Descendants { tree: self, stack }
    }

    /// Concatenated character data of a subtree, untouched
    ///
    /// Skipped elements (`<script>`, `<style>`, ...) below `id` contribute
    /// nothing, matching what the emitters render.
    pub fn visible_text(&self, id: NodeId) -> String {
        let mut text = String::new();
        let mut stack = if id < self.nodes.len() { vec![id] } else { Vec::new() };
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current];
            match node.kind {
                NodeKind::Text => text.push_str(&node.text),
                NodeKind::Element if current != id && is_skipped(&node.tag) => {}
                _ => stack.extend(node.child_ids.iter().rev()),
            }
        }
        text
    }

    /// Visible text of a subtree with whitespace collapsed and trimmed
    pub fn normalized_text(&self, id: NodeId) -> String {
        normalize_whitespace(&self.visible_text(id))
    }

    /// First element in the subtree of `id` (inclusive) matching `predicate`
    pub fn find_first<F>(&self, id: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        self.descendants(id)
            .find(|&n| self.nodes.get(n).is_some_and(|node| node.is_element() && predicate(node)))
    }

    /// First element with the given tag name
    pub fn find_tag(&self, tag: &str) -> Option<NodeId> {
        self.find_first(self.root(), |n| n.tag == tag)
    }

    /// Detect the node holding the page's main content
    ///
    /// Tries, in order: the first `<main>`, the first `<article>`, the first
    /// element with `id="content"` or class `content`, the first element with
    /// `role="main"`, `<body>`, and finally the document root.
    pub fn main_content(&self) -> NodeId {
        let root = self.root();
        self.find_tag("main")
            .or_else(|| self.find_tag("article"))
            .or_else(|| self.find_first(root, |n| n.attr("id") == Some("content") || n.has_class("content")))
            .or_else(|| self.find_first(root, |n| n.attr("role") == Some("main")))
            .or_else(|| self.find_tag("body"))
            .unwrap_or(root)
    }

    /// Get the total number of nodes, including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the tree holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-order iterator over a subtree, see [`DomTree::descendants`]
pub struct Descendants<'a> {
    tree: &'a DomTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree.children(id).iter().rev());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builds_tree() {
        let tree = DomTree::parse(r#"<div class="container"><p>Test paragraph</p></div>"#);
        let p = tree.find_tag("p").unwrap();
        let div = tree.get_node(p).unwrap().parent_id.unwrap();
        assert_eq!(tree.tag(div), "div");
        assert_eq!(tree.visible_text(p), "Test paragraph");
        assert!(tree.get_node(div).unwrap().has_class("container"));
    }

    #[test]
    fn test_children_follow_parents() {
        let tree = DomTree::parse("<ul><li>One</li><li>Two</li></ul><p>After</p>");
        for id in 0..tree.len() {
            if let Some(parent) = tree.get_node(id).unwrap().parent_id {
                assert!(parent < id);
            }
        }
    }

    #[test]
    fn test_attributes_keep_order() {
        let mut tree = DomTree::new();
        let root = tree.root();
        let img = tree.push_element(root, "IMG", [("src", "a.png"), ("alt", "A"), ("width", "10")]);
        let node = tree.get_node(img).unwrap();
        assert_eq!(node.tag, "img");
        let names: Vec<&str> = node.attributes.keys().map(String::as_str).collect();
        assert_eq!(names, ["src", "alt", "width"]);
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let tree = DomTree::parse("<h1>Title<script>evil()</script><style>.x{}</style> <b>bold</b></h1>");
        let h1 = tree.find_tag("h1").unwrap();
        assert_eq!(tree.visible_text(h1), "Title bold");
        assert_eq!(tree.normalized_text(h1), "Title bold");

        let script = tree.find_tag("script").unwrap();
        assert_eq!(tree.visible_text(script), "evil()");
    }

    #[test]
    fn test_content_flags() {
        let tree = DomTree::parse("<div id=a> </div><div id=b><span>x</span></div><div id=c><img src=x></div>");
        let find = |id: &str| tree.find_first(tree.root(), |n| n.attr("id") == Some(id)).unwrap();
        assert!(!tree.has_text(find("a")));
        assert!(tree.has_text(find("b")));
        assert!(!tree.has_text(find("c")));
        assert!(tree.has_image(find("c")));
        assert!(!tree.has_image(find("b")));
    }

    #[test]
    fn test_main_content_priority() {
        let tree = DomTree::parse("<body><div class='content'>c</div><article>a</article><main>m</main></body>");
        assert_eq!(tree.tag(tree.main_content()), "main");

        let tree = DomTree::parse("<body><div class='x content'>c</div><div role='main'>r</div></body>");
        assert!(tree.get_node(tree.main_content()).unwrap().has_class("content"));

        let tree = DomTree::parse("<body><div role='main'>r</div></body>");
        assert_eq!(tree.attr(tree.main_content(), "role"), Some("main"));

        let tree = DomTree::parse("<p>loose</p>");
        assert_eq!(tree.tag(tree.main_content()), "body");

        let tree = DomTree::new();
        assert_eq!(tree.main_content(), tree.root());
    }

    #[test]
    fn test_deeply_nested_tree() {
        let depth = 6_000;
        let html = format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let tree = DomTree::parse(&html);
        assert!(tree.len() > depth);
        assert_eq!(tree.normalized_text(tree.root()), "deep");
        assert!(tree.has_text(tree.find_tag("div").unwrap()));
    }
}
