//! Output dialects.
//!
//! Each dialect module exposes a `convert(tree, root, cx)` body conversion
//! and a [`Formatter`] that wraps the body in the dialect's page header and
//! footer.

pub mod html;
pub mod inline;
pub mod markdown;
pub mod tagged;
pub mod xml;

pub use html::{HtmlFormatter, RawFormatter};
pub use markdown::MarkdownFormatter;
pub use tagged::TaggedFormatter;
pub use xml::XmlFormatter;

use crate::dom::{DomTree, NodeId};
use crate::images::ImageRef;
use crate::metadata::Metadata;
use crate::{Dialect, FormatContext};

/// Everything a formatter needs to render a full page
#[derive(Debug, Clone, Copy)]
pub struct PageParts<'a> {
    pub tree: &'a DomTree,
    /// Content root inside `tree`
    pub root: NodeId,
    pub metadata: &'a Metadata,
    pub images: &'a [ImageRef],
}

/// A dialect's body conversion plus page wrapper
pub trait Formatter {
    /// Convert the subtree at `root`
    fn body(&self, tree: &DomTree, root: NodeId) -> String;

    /// Render a complete page: header, body, optional images, footer
    fn page(&self, parts: &PageParts<'_>) -> String;
}

/// The formatter for the context's dialect
pub fn formatter_for(cx: &FormatContext) -> Box<dyn Formatter + '_> {
    match cx.dialect {
        Dialect::Markdown => Box::new(MarkdownFormatter::new(cx)),
        Dialect::Xml => Box::new(XmlFormatter::new(cx)),
        Dialect::Tagged => Box::new(TaggedFormatter::new(cx)),
        Dialect::Html => Box::new(HtmlFormatter::new(cx)),
        Dialect::Raw => Box::new(RawFormatter::new(cx)),
    }
}
