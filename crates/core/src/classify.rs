//! Maps tag names to the rendering category the emitters dispatch on.

/// Elements that never have children processed
const VOID_TAGS: [&str; 14] = [
    "img", "br", "hr", "meta", "input", "link", "area", "base", "col", "embed", "param", "source", "track", "wbr",
];

/// Elements omitted from every dialect together with their content
const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "iframe"];

/// Tags that own their own lines in formatted HTML output
const BLOCK_LEVEL_TAGS: [&str; 28] = [
    "div",
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "table",
    "tr",
    "td",
    "th",
    "article",
    "section",
    "header",
    "footer",
    "nav",
    "aside",
    "main",
    "figure",
    "figcaption",
    "form",
    "pre",
    "blockquote",
    "hr",
];

/// Containers whose children are scheduled in place
const GENERIC_BLOCK_TAGS: [&str; 27] = [
    "div",
    "section",
    "article",
    "header",
    "footer",
    "nav",
    "aside",
    "main",
    "figure",
    "figcaption",
    "form",
    "tbody",
    "thead",
    "tfoot",
    "tr",
    "td",
    "th",
    "li",
    "dl",
    "dt",
    "dd",
    "details",
    "summary",
    "body",
    "html",
    "address",
    "fieldset",
];

/// Rendering category of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// h1 through h6, carrying the level
    Heading(u8),
    Paragraph,
    Strong,
    Emphasis,
    InlineCode,
    CodeBlock,
    Quote,
    List { ordered: bool },
    Table,
    Image,
    Link,
    LineBreak,
    Rule,
    /// A void element with no rendering of its own
    Void,
    Skip,
    GenericBlock,
    GenericInline,
}

impl Category {
    /// Whether adjacent siblings of this category merge into one run
    pub fn merges_runs(self) -> bool {
        self == Category::GenericInline
    }
}

/// Classify a lowercase tag name
pub fn classify(tag: &str) -> Category {
    match tag {
        "h1" => Category::Heading(1),
        "h2" => Category::Heading(2),
        "h3" => Category::Heading(3),
        "h4" => Category::Heading(4),
        "h5" => Category::Heading(5),
        "h6" => Category::Heading(6),
        "p" => Category::Paragraph,
        "strong" | "b" => Category::Strong,
        "em" | "i" => Category::Emphasis,
        "code" => Category::InlineCode,
        "pre" => Category::CodeBlock,
        "blockquote" => Category::Quote,
        "ul" => Category::List { ordered: false },
        "ol" => Category::List { ordered: true },
        "table" => Category::Table,
        "img" => Category::Image,
        "a" => Category::Link,
        "br" => Category::LineBreak,
        "hr" => Category::Rule,
        _ if is_skipped(tag) => Category::Skip,
        _ if is_void(tag) => Category::Void,
        _ if GENERIC_BLOCK_TAGS.contains(&tag) => Category::GenericBlock,
        _ => Category::GenericInline,
    }
}

/// Whether `tag` is a void element
pub fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Whether `tag` is omitted from output entirely
pub fn is_skipped(tag: &str) -> bool {
    SKIPPED_TAGS.contains(&tag)
}

/// Whether `tag` belongs to the block-level set used by formatted HTML
pub fn is_block_level(tag: &str) -> bool {
    BLOCK_LEVEL_TAGS.contains(&tag)
}
