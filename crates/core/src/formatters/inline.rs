//! Flattens a subtree into one line of text, markdown-styled or plain.
//!
//! Used for paragraphs, list items, table cells and quotes, where the walk
//! wants the whole subtree as a single string. Rendering keeps its own
//! explicit stack so deeply nested inline markup is safe.

use crate::FormatContext;
use crate::classify::{Category, classify, is_block_level};
use crate::dom::{DomTree, NodeId, NodeKind};
use crate::postprocess::normalize_whitespace;

/// How inline markup is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineStyle {
    /// `**strong**`, `*em*`, `` `code` ``, `[label](href)`, `![alt](src)`
    Markdown,
    /// Text only; links keep their label, images their alt text
    Plain,
}

/// Options for one inline rendering
#[derive(Debug, Clone, Copy)]
pub struct InlineOptions {
    pub style: InlineStyle,
    /// Leave out nested `<ul>`/`<ol>` (list items render those separately)
    pub skip_lists: bool,
}

impl InlineOptions {
    pub fn markdown() -> Self {
        Self { style: InlineStyle::Markdown, skip_lists: false }
    }

    pub fn plain() -> Self {
        Self { style: InlineStyle::Plain, skip_lists: false }
    }

    pub fn without_lists(mut self) -> Self {
        self.skip_lists = true;
        self
    }
}

enum Wrap {
    Strong,
    Emphasis,
    Link(Option<String>),
}

enum Step {
    Open(NodeId),
    Close(Wrap),
}

/// Render the children of `id`
pub fn render_children(tree: &DomTree, id: NodeId, cx: &FormatContext, options: InlineOptions) -> String {
    render(tree, tree.children(id), cx, options)
}

/// Render `id` itself
pub fn render_node(tree: &DomTree, id: NodeId, cx: &FormatContext, options: InlineOptions) -> String {
    render(tree, &[id], cx, options)
}

/// Render a sequence of sibling subtrees into one trimmed string
///
/// Whitespace runs collapse to one space; `<br>` survives as a newline.
pub fn render(tree: &DomTree, roots: &[NodeId], cx: &FormatContext, options: InlineOptions) -> String {
    let markdown = options.style == InlineStyle::Markdown;
    let mut steps: Vec<Step> = roots.iter().rev().map(|&id| Step::Open(id)).collect();
    let mut buffers = vec![String::new()];

    while let Some(step) = steps.pop() {
        match step {
            Step::Open(id) => {
                let Some(node) = tree.get_node(id) else {
                    continue;
                };
                let Some(out) = buffers.last_mut() else {
                    break;
                };

                if node.kind == NodeKind::Text {
                    push_text(out, &node.text);
                    continue;
                }
                if node.kind != NodeKind::Element {
                    continue;
                }

                let category = classify(&node.tag);
                match category {
                    Category::Skip => {}
                    Category::List { .. } if options.skip_lists => {}
                    Category::LineBreak => {
                        trim_trailing_spaces(out);
                        out.push('\n');
                    }
                    Category::Image => {
                        let image = if markdown { image_markdown(tree, id, cx) } else { image_alt(tree, id) };
                        push_piece(out, &image);
                    }
                    Category::InlineCode if markdown => {
                        push_piece(out, &code_span(&tree.visible_text(id)));
                    }
                    Category::Strong | Category::Emphasis | Category::Link if markdown => {
                        let wrap = match category {
                            Category::Strong => Wrap::Strong,
                            Category::Emphasis => Wrap::Emphasis,
                            _ => Wrap::Link(node.attr("href").map(str::to_string)),
                        };
                        buffers.push(String::new());
                        steps.push(Step::Close(wrap));
                        steps.extend(tree.children(id).iter().rev().map(|&c| Step::Open(c)));
                    }
                    _ => {
                        if is_block_level(&node.tag) {
                            push_space(out);
                        }
                        steps.extend(tree.children(id).iter().rev().map(|&c| Step::Open(c)));
                    }
                }
            }
            Step::Close(wrap) => {
                let inner = buffers.pop().unwrap_or_default();
                let Some(out) = buffers.last_mut() else {
                    break;
                };
                let label = inner.trim();
                let rendered = match wrap {
                    Wrap::Strong if !label.is_empty() => format!("**{}**", label),
                    Wrap::Emphasis if !label.is_empty() => format!("*{}*", label),
                    Wrap::Link(href) => link_markdown(label, href.as_deref(), cx),
                    _ => String::new(),
                };
                if inner.starts_with(' ') {
                    push_space(out);
                }
                push_piece(out, &rendered);
                if inner.ends_with(' ') {
                    push_space(out);
                }
            }
        }
    }

    let out = buffers.into_iter().next().unwrap_or_default();
    out.lines().map(str::trim).collect::<Vec<_>>().join("\n").trim().to_string()
}

/// Append character data, collapsing whitespace against what is already there
fn push_text(out: &mut String, text: &str) {
    let starts_with_space = text.starts_with(char::is_whitespace);
    let ends_with_space = text.ends_with(char::is_whitespace);
    let core = normalize_whitespace(text);

    if starts_with_space || (core.is_empty() && !text.is_empty()) {
        push_space(out);
    }
    if !core.is_empty() {
        out.push_str(&core);
        if ends_with_space {
            out.push(' ');
        }
    }
}

fn push_piece(out: &mut String, piece: &str) {
    out.push_str(piece);
}

/// Add one separating space; a leading space is trimmed when the line is finished
fn push_space(out: &mut String) {
    if !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
}

fn trim_trailing_spaces(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
}

/// Wrap code in backticks, doubling them when the code contains one
///
/// Code that starts or ends with a backtick is padded with a space so the
/// delimiters stay distinct from the content.
pub fn code_span(code: &str) -> String {
    if !code.contains('`') {
        format!("`{}`", code)
    } else if code.starts_with('`') || code.ends_with('`') {
        format!("`` {} ``", code)
    } else {
        format!("``{}``", code)
    }
}

/// `[label](href)` with the fallbacks for missing parts
///
/// No href links the label to itself; no label shows the href; neither
/// renders nothing.
pub fn link_markdown(label: &str, href: Option<&str>, cx: &FormatContext) -> String {
    let href = href.map(str::trim).filter(|h| !h.is_empty());
    match (label.is_empty(), href) {
        (true, None) => String::new(),
        (false, None) => format!("[{}]({})", label, label),
        (true, Some(href)) => {
            let target = cx.resolve(href);
            format!("[{}]({})", target, target)
        }
        (false, Some(href)) => format!("[{}]({})", label, cx.resolve(href)),
    }
}

/// Alt text of an image, `Image` when missing or blank
pub fn alt_text(tree: &DomTree, id: NodeId) -> String {
    tree.attr(id, "alt")
        .map(normalize_whitespace)
        .filter(|alt| !alt.is_empty())
        .unwrap_or_else(|| "Image".to_string())
}

/// ` (Width: w, Height: h)` when both dimensions are present
pub fn dimensions_suffix(tree: &DomTree, id: NodeId) -> String {
    match (tree.attr(id, "width"), tree.attr(id, "height")) {
        (Some(w), Some(h)) if !w.trim().is_empty() && !h.trim().is_empty() => {
            format!(" (Width: {}, Height: {})", w.trim(), h.trim())
        }
        _ => String::new(),
    }
}

/// `![alt](target)`, with image-map substitution; nothing without a `src`
pub fn image_markdown(tree: &DomTree, id: NodeId, cx: &FormatContext) -> String {
    let Some(src) = tree.attr(id, "src").map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    format!("![{}]({}){}", alt_text(tree, id), cx.image_target(src), dimensions_suffix(tree, id))
}

fn image_alt(tree: &DomTree, id: NodeId) -> String {
    if tree.attr(id, "src").is_some_and(|s| !s.trim().is_empty()) { alt_text(tree, id) } else { String::new() }
}
