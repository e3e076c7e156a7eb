//! Tagged text: one `tag: text` line per rendered element.
//!
//! The format is meant for prompts that want the page's structure without
//! any markup syntax. Adjacent spans collapse into a single `span:` line and
//! list items already seen earlier in the document are dropped.

use crate::FormatContext;
use crate::dom::{DomTree, NodeId};
use crate::formatters::inline::{self, InlineOptions};
use crate::formatters::markdown::{row_cells, table_rows, visit_list_items};
use crate::formatters::{Formatter, PageParts};
use crate::postprocess::{DedupSet, OutputBuffer, merge_inline_run, normalize_whitespace};
use crate::traverse::{ElementView, Emitter, RunView, Visit, walk};

/// Convert the subtree at `root` to tagged lines
pub fn convert(tree: &DomTree, root: NodeId, cx: &FormatContext) -> String {
    let mut emitter = TaggedEmitter::new(cx);
    walk(tree, root, cx.preformatted, &mut emitter);
    emitter.finish()
}

/// Walk strategy producing `tag: text` lines
pub struct TaggedEmitter<'a> {
    cx: &'a FormatContext,
    buffer: OutputBuffer,
    seen: DedupSet,
}

impl<'a> TaggedEmitter<'a> {
    pub fn new(cx: &'a FormatContext) -> Self {
        Self { cx, buffer: OutputBuffer::new(), seen: DedupSet::new() }
    }

    pub fn finish(self) -> String {
        self.buffer.join().trim_end().to_string()
    }

    fn line(&mut self, tag: &str, text: &str) {
        if !text.is_empty() {
            self.buffer.block(format!("{}: {}\n", tag, text));
        }
    }

    /// Plain one-line text of the element's subtree
    fn plain(&self, el: &ElementView<'_>) -> String {
        normalize_whitespace(&inline::render_children(el.tree, el.id, self.cx, InlineOptions::plain()))
    }

    fn tagged_line(&mut self, el: &ElementView<'_>) -> Visit {
        let text = self.plain(el);
        self.line(el.tag(), &text);
        Visit::Consumed
    }
}

impl Emitter for TaggedEmitter<'_> {
    fn heading(&mut self, el: &ElementView<'_>, _level: u8) -> Visit {
        self.tagged_line(el)
    }

    fn paragraph(&mut self, el: &ElementView<'_>) -> Visit {
        self.tagged_line(el)
    }

    fn strong(&mut self, el: &ElementView<'_>) -> Visit {
        self.tagged_line(el)
    }

    fn emphasis(&mut self, el: &ElementView<'_>) -> Visit {
        self.tagged_line(el)
    }

    fn inline_code(&mut self, el: &ElementView<'_>) -> Visit {
        let code = normalize_whitespace(&el.tree.visible_text(el.id));
        self.line("code", &code);
        Visit::Consumed
    }

    fn code_block(&mut self, el: &ElementView<'_>) -> Visit {
        let code = el.tree.visible_text(el.id);
        self.line("pre", code.trim_end_matches('\n'));
        Visit::Consumed
    }

    fn quote(&mut self, el: &ElementView<'_>) -> Visit {
        self.tagged_line(el)
    }

    fn list(&mut self, el: &ElementView<'_>, _ordered: bool) -> Visit {
        let tree = el.tree;
        let cx = self.cx;
        let mut items = Vec::new();
        let seen = &mut self.seen;

        visit_list_items(tree, el.id, |item| {
            let text = normalize_whitespace(&inline::render_children(
                tree,
                item.li,
                cx,
                InlineOptions::plain().without_lists(),
            ));
            if text.is_empty() {
                return Some(item.level);
            }
            if !seen.first_occurrence(&text) {
                return None;
            }
            items.push(text);
            Some(item.level + 1)
        });

        for text in items {
            self.line("li", &text);
        }
        Visit::Consumed
    }

    fn table(&mut self, el: &ElementView<'_>) -> Visit {
        for row in table_rows(el.tree, el.id) {
            let cells: Vec<String> = row_cells(el.tree, row)
                .into_iter()
                .map(|cell| normalize_whitespace(&inline::render_children(el.tree, cell, self.cx, InlineOptions::plain())))
                .collect();
            if cells.iter().any(|c| !c.is_empty()) {
                self.line("tr", &cells.join(" | "));
            }
        }
        Visit::Consumed
    }

    fn image(&mut self, el: &ElementView<'_>) -> Visit {
        if let Some(src) = el.attr("src").map(str::trim).filter(|s| !s.is_empty()) {
            let line = format!("{} ({})", inline::alt_text(el.tree, el.id), self.cx.image_target(src));
            self.line("img", &line);
        }
        Visit::Consumed
    }

    fn link(&mut self, el: &ElementView<'_>) -> Visit {
        let label = self.plain(el);
        let href = el.attr("href").map(str::trim).filter(|h| !h.is_empty());
        let line = match href {
            Some(href) if label.is_empty() => self.cx.resolve(href),
            Some(href) => format!("{} ({})", label, self.cx.resolve(href)),
            None => label,
        };
        self.line("a", &line);
        Visit::Consumed
    }

    fn line_break(&mut self, _el: &ElementView<'_>) -> Visit {
        Visit::Consumed
    }

    fn rule(&mut self, _el: &ElementView<'_>) -> Visit {
        self.line("hr", "---");
        Visit::Consumed
    }

    fn void(&mut self, _el: &ElementView<'_>) -> Visit {
        Visit::Skip
    }

    fn generic_inline(&mut self, el: &ElementView<'_>) -> Visit {
        if el.tag() == "span" { self.tagged_line(el) } else { Visit::Descend }
    }

    fn inline_run(&mut self, run: &RunView<'_>) {
        let text = merge_inline_run(
            run.ids
                .iter()
                .map(|&id| inline::render_children(run.tree, id, self.cx, InlineOptions::plain())),
        );
        let tag = match run.ids.first() {
            Some(&id) if run.tree.tag(id) == "span" => "span",
            _ => "text",
        };
        self.line(tag, &text);
    }

    fn text(&mut self, text: &str, pre: bool, _depth: usize) {
        if pre {
            self.line("pre", text.trim_end_matches('\n'));
        } else {
            self.line("text", text);
        }
    }
}

/// Tagged-text formatter bound to one conversion context
pub struct TaggedFormatter<'a> {
    cx: &'a FormatContext,
}

impl<'a> TaggedFormatter<'a> {
    pub fn new(cx: &'a FormatContext) -> Self {
        Self { cx }
    }
}

impl Formatter for TaggedFormatter<'_> {
    fn body(&self, tree: &DomTree, root: NodeId) -> String {
        convert(tree, root, self.cx)
    }

    fn page(&self, parts: &PageParts<'_>) -> String {
        let metadata = parts.metadata;
        let mut out = String::new();

        if let Some(url) = &metadata.url {
            out.push_str(&format!("URL: {}\n\n", url));
        }
        out.push_str(&format!("Title: {}\n", metadata.display_title()));
        if let Some(description) = &metadata.description {
            out.push_str(&format!("Description: {}\n", description));
        }
        out.push_str("\nContent:\n\n");
        out.push_str(&self.body(parts.tree, parts.root));

        if self.cx.include_images && !parts.images.is_empty() {
            out.push_str("\n\nImages:\n\n");
            let lines: Vec<String> = parts
                .images
                .iter()
                .map(|img| format!("img: {} ({})", img.alt_text(), self.cx.image_target(&img.url)))
                .collect();
            out.push_str(&lines.join("\n"));
        }

        out.push_str("\n\n---\n");
        out
    }
}
