use std::collections::HashMap;

use crate::FormatContext;
use crate::classify::is_block_level;
use crate::dom::{DomTree, NodeId};
use crate::formatters::inline::{self, InlineOptions};
use crate::formatters::{Formatter, PageParts};
use crate::postprocess::{DedupSet, OutputBuffer, collapse_newlines, ensure_heading_spacing, normalize_whitespace};
use crate::traverse::{ElementView, Emitter, RunView, Visit, walk};

/// Convert the subtree at `root` to Markdown
pub fn convert(tree: &DomTree, root: NodeId, cx: &FormatContext) -> String {
    let mut emitter = MarkdownEmitter::new(cx);
    walk(tree, root, cx.preformatted, &mut emitter);
    emitter.finish()
}

/// Walk strategy producing Markdown blocks
pub struct MarkdownEmitter<'a> {
    cx: &'a FormatContext,
    buffer: OutputBuffer,
    seen: DedupSet,
}

impl<'a> MarkdownEmitter<'a> {
    pub fn new(cx: &'a FormatContext) -> Self {
        Self { cx, buffer: OutputBuffer::new(), seen: DedupSet::new() }
    }

    /// Join the buffer and tidy blank lines
    pub fn finish(self) -> String {
        let joined = self.buffer.join();
        collapse_newlines(&ensure_heading_spacing(&joined)).trim().to_string()
    }

    fn inline_node(&mut self, el: &ElementView<'_>) -> Visit {
        let text = inline::render_node(el.tree, el.id, self.cx, InlineOptions::markdown());
        self.buffer.inline(text);
        Visit::Consumed
    }
}

impl Emitter for MarkdownEmitter<'_> {
    fn heading(&mut self, el: &ElementView<'_>, level: u8) -> Visit {
        let text = el.text();
        if !text.is_empty() {
            self.buffer.block(format!("\n{} {}\n\n", "#".repeat(level as usize), text));
        }
        Visit::Consumed
    }

    fn paragraph(&mut self, el: &ElementView<'_>) -> Visit {
        let text = inline::render_children(el.tree, el.id, self.cx, InlineOptions::markdown());
        if !text.is_empty() {
            self.buffer.block(format!("{}\n\n", text));
        }
        Visit::Consumed
    }

    fn strong(&mut self, el: &ElementView<'_>) -> Visit {
        self.inline_node(el)
    }

    fn emphasis(&mut self, el: &ElementView<'_>) -> Visit {
        self.inline_node(el)
    }

    fn inline_code(&mut self, el: &ElementView<'_>) -> Visit {
        self.inline_node(el)
    }

    fn link(&mut self, el: &ElementView<'_>) -> Visit {
        self.inline_node(el)
    }

    fn image(&mut self, el: &ElementView<'_>) -> Visit {
        self.inline_node(el)
    }

    fn code_block(&mut self, el: &ElementView<'_>) -> Visit {
        self.buffer.block(code_fence(el.tree, el.id));
        Visit::Consumed
    }

    fn quote(&mut self, el: &ElementView<'_>) -> Visit {
        let quoted = render_quote(el.tree, el.id, self.cx);
        if !quoted.is_empty() {
            self.buffer.block(format!("{}\n\n", quoted));
        }
        Visit::Consumed
    }

    fn list(&mut self, el: &ElementView<'_>, _ordered: bool) -> Visit {
        let list = render_list(el.tree, el.id, self.cx, &mut self.seen);
        if !list.is_empty() {
            self.buffer.block(format!("{}\n\n", list));
        }
        Visit::Consumed
    }

    fn table(&mut self, el: &ElementView<'_>) -> Visit {
        let table = render_table(el.tree, el.id, self.cx);
        if !table.is_empty() {
            self.buffer.block(format!("{}\n\n", table));
        }
        Visit::Consumed
    }

    fn line_break(&mut self, _el: &ElementView<'_>) -> Visit {
        self.buffer.line_break();
        Visit::Consumed
    }

    fn rule(&mut self, _el: &ElementView<'_>) -> Visit {
        self.buffer.block("---\n\n");
        Visit::Consumed
    }

    fn void(&mut self, _el: &ElementView<'_>) -> Visit {
        Visit::Skip
    }

    fn generic_block(&mut self, _el: &ElementView<'_>) -> Visit {
        self.buffer.end_line();
        Visit::DescendAndClose
    }

    fn inline_run(&mut self, run: &RunView<'_>) {
        let text = run
            .ids
            .iter()
            .map(|&id| inline::render_children(run.tree, id, self.cx, InlineOptions::markdown()))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.buffer.inline(text);
    }

    fn text(&mut self, text: &str, pre: bool, _depth: usize) {
        if pre {
            self.buffer.block(text);
        } else {
            self.buffer.inline(text);
        }
    }

    fn close(&mut self, el: &ElementView<'_>) {
        if is_block_level(el.tag()) || el.tag() == "body" {
            self.buffer.end_line();
        }
    }
}

/// Language named by a `language-*` class on `id`
fn language_class(tree: &DomTree, id: NodeId) -> Option<String> {
    tree.attr(id, "class")?
        .split_whitespace()
        .find_map(|c| c.strip_prefix("language-"))
        .filter(|lang| !lang.is_empty() && !lang.contains('`'))
        .map(str::to_string)
}

/// Fenced code block for a `<pre>`
///
/// The code is the raw text of the inner `<code>` when there is one. The
/// language comes from the `<pre>` first, then the `<code>`.
pub fn code_fence(tree: &DomTree, pre: NodeId) -> String {
    let code_el = tree.find_first(pre, |n| n.tag == "code");
    let code = tree.visible_text(code_el.unwrap_or(pre));
    let lang = language_class(tree, pre)
        .or_else(|| code_el.and_then(|c| language_class(tree, c)))
        .unwrap_or_default();
    format!("```{}\n{}\n```\n\n", lang, code.trim_end_matches('\n'))
}

/// Quote lines for a `<blockquote>`, one paragraph per block child
///
/// Empty lines between paragraphs become a bare `>`.
pub fn render_quote(tree: &DomTree, id: NodeId, cx: &FormatContext) -> String {
    let mut segments = Vec::new();
    let mut pending: Vec<NodeId> = Vec::new();

    for &child in tree.children(id) {
        if is_block_level(tree.tag(child)) {
            segments.push(inline::render(tree, &pending, cx, InlineOptions::markdown()));
            pending.clear();
            segments.push(inline::render_node(tree, child, cx, InlineOptions::markdown()));
        } else {
            pending.push(child);
        }
    }
    segments.push(inline::render(tree, &pending, cx, InlineOptions::markdown()));

    let text = segments.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n\n");
    text.lines()
        .map(|line| if line.trim().is_empty() { ">".to_string() } else { format!("> {}", line) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The lists directly owned by a list item (not those inside a nested list)
fn nested_lists(tree: &DomTree, li: NodeId) -> Vec<NodeId> {
    let mut lists = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(li).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        match tree.tag(id) {
            "ul" | "ol" => lists.push(id),
            "" => {}
            _ => stack.extend(tree.children(id).iter().rev()),
        }
    }
    lists
}

/// A list item with the list that owns it and its nesting level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListItem {
    pub li: NodeId,
    pub list: NodeId,
    pub level: usize,
}

/// Visit the direct `<li>` children of `list`, and of every list nested
/// under them, in document order
///
/// `visit` returns the level to give the item's nested lists, or `None` to
/// skip them.
pub fn visit_list_items(tree: &DomTree, list: NodeId, mut visit: impl FnMut(ListItem) -> Option<usize>) {
    let items_of = |list: NodeId, level: usize| -> Vec<ListItem> {
        tree.children(list)
            .iter()
            .filter(|&&c| tree.tag(c) == "li")
            .map(|&li| ListItem { li, list, level })
            .collect()
    };

    let mut stack: Vec<ListItem> = items_of(list, 0).into_iter().rev().collect();
    while let Some(item) = stack.pop() {
        let Some(child_level) = visit(item) else {
            continue;
        };
        for nested in nested_lists(tree, item.li).into_iter().rev() {
            stack.extend(items_of(nested, child_level).into_iter().rev());
        }
    }
}

/// Render a list and everything nested under it
///
/// Nested lists follow their item, indented two spaces per level. An item
/// whose text was already emitted anywhere in the document is dropped
/// together with its nested lists.
pub fn render_list(tree: &DomTree, list: NodeId, cx: &FormatContext, seen: &mut DedupSet) -> String {
    let mut lines = Vec::new();
    let mut counters: HashMap<NodeId, usize> = HashMap::new();

    visit_list_items(tree, list, |item| {
        let text = inline::render_children(tree, item.li, cx, InlineOptions::markdown().without_lists())
            .replace('\n', " ");
        if text.is_empty() {
            return Some(item.level);
        }
        if !seen.first_occurrence(&text) {
            return None;
        }

        let marker = if tree.tag(item.list) == "ol" {
            let n = counters.entry(item.list).or_insert(0);
            *n += 1;
            format!("{}.", n)
        } else {
            "-".to_string()
        };
        lines.push(format!("{}{} {}", "  ".repeat(item.level), marker, text));
        Some(item.level + 1)
    });

    lines.join("\n")
}

/// Rows of a table, skipping rows that belong to nested tables
pub fn table_rows(tree: &DomTree, table: NodeId) -> Vec<NodeId> {
    let mut rows = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(table).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        match tree.tag(id) {
            "tr" => rows.push(id),
            "table" | "" => {}
            _ => stack.extend(tree.children(id).iter().rev()),
        }
    }
    rows
}

/// The `<td>`/`<th>` children of a row
pub fn row_cells(tree: &DomTree, row: NodeId) -> Vec<NodeId> {
    tree.children(row)
        .iter()
        .copied()
        .filter(|&c| matches!(tree.tag(c), "td" | "th"))
        .collect()
}

/// Render a table; the first row with cells is the header
pub fn render_table(tree: &DomTree, table: NodeId, cx: &FormatContext) -> String {
    let cell_text = |cell: NodeId| {
        let text = inline::render_children(tree, cell, cx, InlineOptions::markdown());
        escape_pipe(&normalize_whitespace(&text))
    };

    let mut lines = Vec::new();
    let mut header_written = false;
    for row in table_rows(tree, table) {
        let cells: Vec<String> = row_cells(tree, row).into_iter().map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }
        lines.push(format!("| {} |", cells.join(" | ")));
        if !header_written {
            header_written = true;
            let separators: Vec<String> = cells.iter().map(|c| "-".repeat(c.chars().count().max(3))).collect();
            lines.push(format!("| {} |", separators.join(" | ")));
        }
    }

    lines.join("\n")
}

/// Escape pipe characters for Markdown tables
fn escape_pipe(s: &str) -> String {
    s.replace('|', "\\|")
}

/// Escape a string for a double-quoted frontmatter value
fn yaml_escape_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', " "))
}

/// Generate the frontmatter block
fn generate_frontmatter(parts: &PageParts<'_>) -> String {
    let metadata = parts.metadata;
    let mut frontmatter = vec!["---".to_string()];
    frontmatter.push(format!("title: {}", yaml_escape_string(metadata.display_title())));
    frontmatter.push(format!("source: {}", yaml_escape_string(metadata.url.as_deref().unwrap_or(""))));

    if let Some(date) = &metadata.date {
        frontmatter.push(format!("date: {}", yaml_escape_string(date)));
    }

    if let Some(description) = &metadata.description {
        frontmatter.push(format!("description: {}", yaml_escape_string(description)));
    }

    frontmatter.push("---".to_string());
    frontmatter.join("\n")
}

/// Markdown formatter bound to one conversion context
pub struct MarkdownFormatter<'a> {
    cx: &'a FormatContext,
}

impl<'a> MarkdownFormatter<'a> {
    pub fn new(cx: &'a FormatContext) -> Self {
        Self { cx }
    }
}

impl Formatter for MarkdownFormatter<'_> {
    fn body(&self, tree: &DomTree, root: NodeId) -> String {
        convert(tree, root, self.cx)
    }

    fn page(&self, parts: &PageParts<'_>) -> String {
        let mut sections = Vec::new();

        if self.cx.frontmatter {
            sections.push(generate_frontmatter(parts));
        }

        sections.push(format!("# {}", parts.metadata.display_title()));

        if self.cx.source_link
            && let Some(url) = &parts.metadata.url
        {
            sections.push(format!("Source: [{}]({})", url, url));
        }

        let body = self.body(parts.tree, parts.root);
        if !body.is_empty() {
            sections.push(body);
        }

        if self.cx.include_images && !parts.images.is_empty() {
            let images: Vec<String> = parts
                .images
                .iter()
                .map(|img| format!("![{}]({}){}", img.alt_text(), self.cx.image_target(&img.url), img.dimensions_suffix()))
                .collect();
            sections.push(format!("## Images\n\n{}", images.join("\n")));
        }

        format!("{}\n", sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageRef;
    use crate::metadata::Metadata;

    fn md(html: &str) -> String {
        let tree = DomTree::parse(html);
        convert(&tree, tree.main_content(), &FormatContext::default())
    }

    #[test]
    fn test_headings_and_paragraphs() {
        assert_eq!(md("<h1>A</h1><h2>B</h2>"), "# A\n\n## B");
        assert_eq!(md("<p>One</p><h3>Three</h3><p>Two</p>"), "One\n\n### Three\n\nTwo");
    }

    #[test]
    fn test_inline_markup_in_paragraph() {
        let result = md(r#"<p>Check <a href="https://example.com">this link</a> and <b>that</b>.</p>"#);
        assert_eq!(result, "Check [this link](https://example.com) and **that**.");
    }

    #[test]
    fn test_code_span_with_backtick() {
        assert_eq!(md("<p><code>a`b</code></p>"), "``a`b``");
    }

    #[test]
    fn test_leading_backtick_code_keeps_spacing() {
        assert_eq!(md("<p><code>`x</code></p><p>a</p><h2>B</h2>"), "`` `x ``\n\na\n\n## B");
    }

    #[test]
    fn test_heading_ignores_script_text() {
        assert_eq!(md("<h1>Title<script>evil()</script></h1><p>Body</p>"), "# Title\n\nBody");
        assert_eq!(md("<pre><code>let x = 1;<style>.x{}</style></code></pre>"), "```\nlet x = 1;\n```");
    }

    #[test]
    fn test_table_header_skips_empty_rows() {
        let result = md("<table><tr></tr><tr><td>1</td></tr><tr><td>2</td></tr></table>");
        assert_eq!(result, "| 1 |\n| --- |\n| 2 |");
    }

    #[test]
    fn test_code_block_with_language() {
        let result = md(r#"<pre class="language-rust"><code>fn main() {
    println!("hi");
}
</code></pre>"#);
        assert_eq!(result, "```rust\nfn main() {\n    println!(\"hi\");\n}\n```");

        let result = md(r#"<pre><code class="language-py">x = 1</code></pre>"#);
        assert_eq!(result, "```py\nx = 1\n```");
    }

    #[test]
    fn test_code_block_keeps_blank_lines() {
        let result = md("<p>Before</p><pre>a\n\n\n\nb</pre><p>After</p>");
        assert_eq!(result, "Before\n\n```\na\n\n\n\nb\n```\n\nAfter");
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(md("<blockquote>Quoted text</blockquote>"), "> Quoted text");
        assert_eq!(
            md("<blockquote><p>First</p><p>Second</p></blockquote>"),
            "> First\n>\n> Second"
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(md("<ul><li>One</li><li>Two</li></ul>"), "- One\n- Two");
        assert_eq!(md("<ol><li>One</li><li>Two</li></ol>"), "1. One\n2. Two");
    }

    #[test]
    fn test_nested_list_indented() {
        let result = md("<ul><li>Parent<ol><li>Child</li><li>Other</li></ol></li><li>Next</li></ul>");
        assert_eq!(result, "- Parent\n  1. Child\n  2. Other\n- Next");
    }

    #[test]
    fn test_list_dedup_across_lists() {
        let result = md("<ul><li>Duplicate</li><li>A</li></ul><ul><li>Duplicate</li><li>B</li></ul>");
        assert_eq!(result.matches("- Duplicate").count(), 1);
        assert!(result.contains("- A"));
        assert!(result.contains("- B"));
    }

    #[test]
    fn test_table_exact() {
        let result = md("<table><tr><th>A</th><th>BB</th></tr><tr><td>1</td><td>2</td></tr></table>");
        assert_eq!(result, "| A | BB |\n| --- | --- |\n| 1 | 2 |");
    }

    #[test]
    fn test_table_separator_width_and_pipes() {
        let result = md("<table><thead><tr><th>Column</th><th>a|b</th></tr></thead><tbody><tr><td>x</td></tr></tbody></table>");
        assert_eq!(result, "| Column | a\\|b |\n| ------ | ---- |\n| x |");
    }

    #[test]
    fn test_image_and_missing_alt() {
        assert_eq!(md(r#"<div><img src="http://x/y.png"></div>"#), "![Image](http://x/y.png)");
    }

    #[test]
    fn test_link_without_href() {
        assert_eq!(md("<div><a>label</a></div>"), "[label](label)");
    }

    #[test]
    fn test_rule_and_break() {
        assert_eq!(md("<p>a</p><hr><p>b</p>"), "a\n\n---\n\nb");
        assert_eq!(md("<div>one<br>two</div>"), "one\ntwo");
    }

    #[test]
    fn test_blocks_do_not_share_lines() {
        assert_eq!(md("<div>first</div><div>second</div>"), "first\nsecond");
    }

    #[test]
    fn test_merged_spans() {
        assert_eq!(md("<div><span>Hello</span> <span>world</span></div>"), "Hello world");
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 5_000;
        let mut html = String::new();
        for _ in 0..depth {
            html.push_str("<div><p>Text</p>");
        }
        html.push_str(&"</div>".repeat(depth));
        let result = md(&html);
        assert_eq!(result.matches("Text").count(), depth);
    }

    #[test]
    fn test_idempotent() {
        let html = "<h1>T</h1><ul><li>x</li><li>x</li></ul><p><span>a</span><span>b</span></p>";
        assert_eq!(md(html), md(html));
    }

    #[test]
    fn test_page_wrapper() {
        let tree = DomTree::parse("<main><p>Body text</p></main>");
        let cx = FormatContext::builder().include_images(true).build();
        let metadata = Metadata {
            title: Some("My \"Page\"".to_string()),
            url: Some("https://example.com/page".to_string()),
            description: Some("About it".to_string()),
            ..Default::default()
        };
        let images = vec![ImageRef {
            url: "https://example.com/a.png".to_string(),
            alt: None,
            width: None,
            height: None,
        }];
        let parts = PageParts { tree: &tree, root: tree.main_content(), metadata: &metadata, images: &images };

        let page = MarkdownFormatter::new(&cx).page(&parts);
        assert!(page.starts_with("---\ntitle: \"My \\\"Page\\\"\"\nsource: \"https://example.com/page\"\n"));
        assert!(page.contains("description: \"About it\"\n---\n\n# My \"Page\"\n\n"));
        assert!(page.contains("Source: [https://example.com/page](https://example.com/page)\n\nBody text"));
        assert!(page.ends_with("## Images\n\n![Image](https://example.com/a.png)\n"));
    }

    #[test]
    fn test_page_without_frontmatter_or_source() {
        let tree = DomTree::parse("<p>Body</p>");
        let cx = FormatContext::builder().frontmatter(false).source_link(false).build();
        let metadata = Metadata { url: Some("https://x.org".to_string()), ..Default::default() };
        let parts = PageParts { tree: &tree, root: tree.main_content(), metadata: &metadata, images: &[] };

        assert_eq!(MarkdownFormatter::new(&cx).page(&parts), "# No title\n\nBody\n");
    }
}
