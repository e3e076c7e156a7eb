//! Output assembly and text cleanup shared by every dialect.
//!
//! Emitters push [`Fragment`]s into an [`OutputBuffer`] while the walk runs;
//! the buffer is joined once at the end and then run through the newline
//! passes below.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NEWLINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^\n])\n(#{1,6} )").unwrap());

/// Characters that attach to the preceding inline run without a space
const CLOSING_PUNCTUATION: [char; 7] = ['.', ',', ';', ':', '!', '?', ')'];

/// One unit of emitted output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Text that owns its own line(s); the string carries its trailing newlines
    Block(String),
    /// Text that flows on the current line
    Inline(String),
    /// A hard line break
    Break,
}

/// Append-only sequence of fragments, joined once at the end of a walk
#[derive(Debug, Default)]
pub struct OutputBuffer {
    fragments: Vec<Fragment>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block; an empty string is ignored
    pub fn block(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.fragments.push(Fragment::Block(text));
        }
    }

    /// Append an inline run; an empty string is ignored
    pub fn inline(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.fragments.push(Fragment::Inline(text));
        }
    }

    /// Append a hard line break
    pub fn line_break(&mut self) {
        self.fragments.push(Fragment::Break);
    }

    /// End the current line if inline text is pending
    pub fn end_line(&mut self) {
        if matches!(self.fragments.last(), Some(Fragment::Inline(_))) {
            self.fragments.push(Fragment::Break);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Join every fragment into the final string
    ///
    /// Adjacent inline runs share a line separated by one space, except
    /// before closing punctuation. A block that follows inline text starts on
    /// a fresh line, and inline text that follows a block starts a new one.
    pub fn join(self) -> String {
        let mut out = String::new();
        let mut in_line = false;

        for fragment in self.fragments {
            match fragment {
                Fragment::Inline(text) => {
                    if in_line {
                        let attaches = text.starts_with(CLOSING_PUNCTUATION) || out.ends_with([' ', '\n', '(']);
                        if !attaches {
                            out.push(' ');
                        }
                    } else if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&text);
                    in_line = true;
                }
                Fragment::Block(text) => {
                    if in_line {
                        out.push('\n');
                    }
                    out.push_str(&text);
                    in_line = false;
                }
                Fragment::Break => {
                    out.push('\n');
                    in_line = false;
                }
            }
        }

        if in_line {
            out.push('\n');
        }
        out
    }
}

/// Record of normalized list-item texts already emitted in one conversion
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a normalized text is seen
    ///
    /// Texts differing only in whitespace count as the same item.
    pub fn first_occurrence(&mut self, text: &str) -> bool {
        self.seen.insert(normalize_whitespace(text))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Collapse whitespace runs to a single space and trim
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Join the texts of adjacent sibling spans into one unit
pub fn merge_inline_run<I, S>(texts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .map(|t| normalize_whitespace(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Apply `f` to every stretch of `text` outside fenced code blocks
///
/// A stretch that follows a closing fence is passed to `f` with the fence
/// line still attached, so patterns see the real preceding character.
fn outside_fences(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prose = String::new();
    let mut in_fence = false;

    for line in text.split_inclusive('\n') {
        let is_fence = is_fence_line(line);
        if in_fence {
            if is_fence {
                in_fence = false;
                prose.push_str(line);
            } else {
                out.push_str(line);
            }
        } else if is_fence {
            flush_prose(&mut out, &prose, &f);
            prose.clear();
            out.push_str(line);
            in_fence = true;
        } else {
            prose.push_str(line);
        }
    }

    flush_prose(&mut out, &prose, &f);
    out
}

/// Whether `line` is a whole fence line: three backticks and an optional
/// language word
fn is_fence_line(line: &str) -> bool {
    line.trim()
        .strip_prefix("```")
        .is_some_and(|info| !info.contains('`') && !info.contains(char::is_whitespace))
}

/// Run `f` over a prose stretch, leaving a leading closing fence line untouched
fn flush_prose(out: &mut String, prose: &str, f: &impl Fn(&str) -> String) {
    let fence_len = match prose.split_inclusive('\n').next() {
        Some(first) if is_fence_line(first) => first.len(),
        _ => 0,
    };
    let processed = f(prose);
    out.push_str(&prose[..fence_len]);
    out.push_str(processed.get(fence_len..).unwrap_or(""));
}

/// Replace three or more consecutive newlines with exactly two
pub fn collapse_newlines(text: &str) -> String {
    outside_fences(text, |prose| NEWLINES_RE.replace_all(prose, "\n\n").into_owned())
}

/// Put a blank line before every heading marker that is not at the very start
pub fn ensure_heading_spacing(text: &str) -> String {
    outside_fences(text, |prose| HEADING_RE.replace_all(prose, "$1\n\n$2").into_owned())
}
