//! The iterative walk every dialect is driven by.
//!
//! Pending work lives in a `VecDeque` of [`Frame`]s. The front frame is
//! popped and, when an element asks for its children, they are pushed back
//! onto the front in reverse so siblings keep document order. Nothing here
//! recurses, so nesting depth is limited only by memory.

use std::collections::VecDeque;

use crate::classify::{Category, classify, is_void};
use crate::dom::{DomNode, DomTree, NodeId, NodeKind};
use crate::postprocess::normalize_whitespace;

/// What a frame asks the engine to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    /// Visit one node
    Node(NodeId),
    /// Emit adjacent same-tag inline siblings as one unit
    Run(Vec<NodeId>),
    /// Notify the emitter that an element's children are done
    Close(NodeId),
}

/// One pending unit of traversal work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub work: Work,
    pub depth: usize,
    /// Whether the frame is inside a `<pre>`
    pub pre: bool,
}

/// An emitter's answer for an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// The emitter rendered the whole subtree itself
    Consumed,
    /// Schedule the children
    Descend,
    /// Schedule the children followed by a close frame
    DescendAndClose,
    /// Ignore the subtree
    Skip,
}

/// An element as seen by an emitter
#[derive(Debug, Clone, Copy)]
pub struct ElementView<'a> {
    pub tree: &'a DomTree,
    pub id: NodeId,
    pub depth: usize,
    pub pre: bool,
}

impl<'a> ElementView<'a> {
    pub fn node(&self) -> Option<&'a DomNode> {
        self.tree.get_node(self.id)
    }

    pub fn tag(&self) -> &'a str {
        self.tree.tag(self.id)
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.tree.attr(self.id, name)
    }

    pub fn children(&self) -> &'a [NodeId] {
        self.tree.children(self.id)
    }

    /// Whitespace-normalized text of the subtree
    pub fn text(&self) -> String {
        self.tree.normalized_text(self.id)
    }
}

/// A run of adjacent same-tag inline siblings
#[derive(Debug, Clone, Copy)]
pub struct RunView<'a> {
    pub tree: &'a DomTree,
    pub ids: &'a [NodeId],
    pub depth: usize,
}

/// A dialect strategy driven by [`walk`]
///
/// Every category method defaults to [`Emitter::element`], which defaults to
/// descending, so an emitter only overrides what it renders differently.
pub trait Emitter {
    /// Fallback for every element category
    fn element(&mut self, _el: &ElementView<'_>) -> Visit {
        Visit::Descend
    }

    fn heading(&mut self, el: &ElementView<'_>, _level: u8) -> Visit {
        self.element(el)
    }

    fn paragraph(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn strong(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn emphasis(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn inline_code(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn code_block(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn quote(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn list(&mut self, el: &ElementView<'_>, _ordered: bool) -> Visit {
        self.element(el)
    }

    fn table(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn image(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn link(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn line_break(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn rule(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn void(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn generic_block(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    fn generic_inline(&mut self, el: &ElementView<'_>) -> Visit {
        self.element(el)
    }

    /// Whether adjacent same-tag inline siblings arrive as one run
    fn merges_runs(&self) -> bool {
        true
    }

    /// Merged text of a run, emitted as one text unit by default
    fn inline_run(&mut self, run: &RunView<'_>) {
        let text = crate::postprocess::merge_inline_run(run.ids.iter().map(|&id| run.tree.visible_text(id)));
        if !text.is_empty() {
            self.text(&text, false, run.depth);
        }
    }

    /// Character data: normalized and non-empty outside `<pre>`, verbatim inside
    fn text(&mut self, text: &str, pre: bool, depth: usize);

    /// Called after the children of an element answered with
    /// [`Visit::DescendAndClose`]
    fn close(&mut self, _el: &ElementView<'_>) {}
}

/// Counters reported after a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub frames: usize,
    pub pruned: usize,
    pub max_depth: usize,
}

/// Whether an element is dropped before any emitter sees it
///
/// Skipped tags always go. Outside `<pre>`, so does any non-void element
/// whose subtree has neither text nor an image.
pub fn is_pruned(tree: &DomTree, id: NodeId, pre: bool) -> bool {
    let tag = tree.tag(id);
    if classify(tag) == Category::Skip {
        return true;
    }
    !pre && !is_void(tag) && !tree.has_text(id) && !tree.has_image(id)
}

/// Walk the subtree at `root` in document order, feeding `emitter`
///
/// `preformatted` marks the root as already inside `<pre>`.
pub fn walk<E: Emitter + ?Sized>(tree: &DomTree, root: NodeId, preformatted: bool, emitter: &mut E) -> WalkStats {
    let mut stats = WalkStats::default();
    let mut queue = VecDeque::new();
    if tree.get_node(root).is_some() {
        queue.push_back(Frame { work: Work::Node(root), depth: 0, pre: preformatted });
    }

    while let Some(frame) = queue.pop_front() {
        stats.frames += 1;
        stats.max_depth = stats.max_depth.max(frame.depth);

        match frame.work {
            Work::Node(id) => visit_node(tree, id, frame.depth, frame.pre, emitter, &mut queue, &mut stats),
            Work::Run(ids) => emitter.inline_run(&RunView { tree, ids: &ids, depth: frame.depth }),
            Work::Close(id) => emitter.close(&ElementView { tree, id, depth: frame.depth, pre: frame.pre }),
        }
    }

    tracing::debug!(
        frames = stats.frames,
        pruned = stats.pruned,
        max_depth = stats.max_depth,
        "walk finished"
    );
    stats
}

fn visit_node<E: Emitter + ?Sized>(
    tree: &DomTree, id: NodeId, depth: usize, pre: bool, emitter: &mut E, queue: &mut VecDeque<Frame>,
    stats: &mut WalkStats,
) {
    let Some(node) = tree.get_node(id) else {
        return;
    };

    match node.kind {
        NodeKind::Text => {
            if pre {
                if !node.text.is_empty() {
                    emitter.text(&node.text, true, depth);
                }
            } else {
                let text = normalize_whitespace(&node.text);
                if !text.is_empty() {
                    emitter.text(&text, false, depth);
                }
            }
        }
        NodeKind::Document => schedule_children(tree, id, depth, pre, false, emitter.merges_runs(), queue),
        NodeKind::Element => {
            if is_pruned(tree, id, pre) {
                stats.pruned += 1;
                return;
            }

            let pre = pre || node.tag == "pre";
            let view = ElementView { tree, id, depth, pre };
            let visit = match classify(&node.tag) {
                Category::Heading(level) => emitter.heading(&view, level),
                Category::Paragraph => emitter.paragraph(&view),
                Category::Strong => emitter.strong(&view),
                Category::Emphasis => emitter.emphasis(&view),
                Category::InlineCode => emitter.inline_code(&view),
                Category::CodeBlock => emitter.code_block(&view),
                Category::Quote => emitter.quote(&view),
                Category::List { ordered } => emitter.list(&view, ordered),
                Category::Table => emitter.table(&view),
                Category::Image => emitter.image(&view),
                Category::Link => emitter.link(&view),
                Category::LineBreak => emitter.line_break(&view),
                Category::Rule => emitter.rule(&view),
                Category::Void => emitter.void(&view),
                Category::GenericBlock => emitter.generic_block(&view),
                Category::GenericInline => emitter.generic_inline(&view),
                Category::Skip => Visit::Skip,
            };

            match visit {
                Visit::Descend => schedule_children(tree, id, depth, pre, false, emitter.merges_runs(), queue),
                Visit::DescendAndClose => schedule_children(tree, id, depth, pre, true, emitter.merges_runs(), queue),
                Visit::Consumed | Visit::Skip => {}
            }
        }
    }
}

/// Push the children of `id` to the front of the queue, in order, ahead of
/// everything already pending
fn schedule_children(
    tree: &DomTree, id: NodeId, depth: usize, pre: bool, close: bool, merge: bool, queue: &mut VecDeque<Frame>,
) {
    let child_depth = depth + 1;
    if close {
        queue.push_front(Frame { work: Work::Close(id), depth, pre });
    }

    let works = if pre || !merge {
        tree.children(id).iter().map(|&c| Work::Node(c)).collect()
    } else {
        group_runs(tree, tree.children(id))
    };

    for work in works.into_iter().rev() {
        queue.push_front(Frame { work, depth: child_depth, pre });
    }
}

/// Coalesce adjacent generic-inline siblings sharing a tag into runs
///
/// Whitespace-only text between two members of a run is dropped.
pub fn group_runs(tree: &DomTree, children: &[NodeId]) -> Vec<Work> {
    let mut works = Vec::with_capacity(children.len());
    let mut i = 0;

    while i < children.len() {
        let id = children[i];
        let tag = tree.tag(id);
        let mergeable = tree.get_node(id).is_some_and(DomNode::is_element) && classify(tag).merges_runs();

        if !mergeable {
            works.push(Work::Node(id));
            i += 1;
            continue;
        }

        let mut run = vec![id];
        let mut j = i + 1;
        let mut end = i + 1;
        while j < children.len() {
            let Some(next) = tree.get_node(children[j]) else {
                break;
            };
            if next.is_text() && next.text.trim().is_empty() {
                j += 1;
            } else if next.is_element() && next.tag == tag {
                run.push(children[j]);
                j += 1;
                end = j;
            } else {
                break;
            }
        }

        if run.len() > 1 {
            works.push(Work::Run(run));
        } else {
            works.push(Work::Node(id));
        }
        i = end;
    }

    works
}
