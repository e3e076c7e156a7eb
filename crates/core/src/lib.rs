pub mod classify;
pub mod config;
pub mod context;
pub mod dom;
pub mod error;
pub mod fetch;
pub mod formatters;
pub mod images;
pub mod metadata;
pub mod page;
pub mod parse;
pub mod postprocess;
pub mod preprocess;
pub mod traverse;

pub use config::Config;
pub use context::{Dialect, FormatContext, FormatContextBuilder};
pub use dom::{DomNode, DomTree, NodeId};
pub use error::{ContxtError, Result};
pub use fetch::{FetchConfig, InputSource, is_ignored};
#[cfg(feature = "fetch")]
pub use fetch::fetch_url;
pub use fetch::{fetch_file, fetch_stdin};
pub use formatters::{Formatter, PageParts, formatter_for};
pub use formatters::{html, markdown, tagged, xml};
#[cfg(feature = "fetch")]
pub use images::download_images;
pub use images::{ImageRef, collect_images};
pub use metadata::Metadata;
pub use page::{RenderedPage, error_document, render, render_dialect};
pub use parse::Document;
#[doc(hidden)]
pub use postprocess::{DedupSet, OutputBuffer};
pub use preprocess::{PreprocessConfig, preprocess_html};
#[doc(hidden)]
pub use traverse::{Emitter, Visit, walk};
