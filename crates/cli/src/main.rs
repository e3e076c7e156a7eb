use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use contxt_core::{
    Config, ContxtError, Dialect, FetchConfig, FormatContext, InputSource, Metadata, RenderedPage, download_images,
    error_document, fetch_file, fetch_stdin, fetch_url, is_ignored, render,
};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest file name stem derived from a page title
const MAX_STEM_LEN: usize = 80;

/// Error document message for an input with nothing to convert
const NO_CONTENT: &str = "No content";

/// Convert web pages into Markdown, XML, tagged text or HTML for LLM context
#[derive(Parser, Debug)]
#[command(name = "contxt")]
#[command(version)]
#[command(about = "Convert web pages into LLM-friendly context", long_about = None)]
struct Args {
    /// URLs to fetch, local HTML files, or "-" for stdin
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<String>,

    /// Output file (default: the configured directory, else stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (markdown, xml, tagged, html, raw)
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<Dialect>,

    /// Append a section listing every image on the page
    #[arg(long)]
    include_images: bool,

    /// Download images into DIR and reference the local copies
    #[arg(long, value_name = "DIR")]
    download_images: Option<PathBuf>,

    /// Omit the Markdown frontmatter block
    #[arg(long)]
    no_frontmatter: bool,

    /// Omit the Markdown "Source:" line
    #[arg(long)]
    no_source_link: bool,

    /// Drop non-essential attributes before converting
    #[arg(long)]
    strip_attributes: bool,

    /// Skip URLs containing this path segment (repeatable)
    #[arg(long = "ignore", value_name = "SUBPATH")]
    ignore: Vec<String>,

    /// Print page metadata as JSON to stderr
    #[arg(long)]
    metadata: bool,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Config file (default: <config dir>/contxt/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Config file values with command-line flags applied on top
#[derive(Debug)]
struct Settings {
    context: FormatContext,
    ignore_patterns: Vec<String>,
    fetch: FetchConfig,
    directory: Option<PathBuf>,
    download_dir: Option<PathBuf>,
}

impl Settings {
    fn new(args: &Args, config: Config) -> Self {
        let mut context = config.format_context();
        if let Some(format) = args.format {
            context.dialect = format;
        }
        context.include_images |= args.include_images;
        context.frontmatter &= !args.no_frontmatter;
        context.source_link &= !args.no_source_link;
        context.strip_attributes |= args.strip_attributes;

        let mut fetch = config.fetch_config();
        if let Some(timeout) = args.timeout {
            fetch.timeout = timeout;
        }
        if let Some(user_agent) = &args.user_agent {
            fetch.user_agent = user_agent.clone();
        }

        let mut ignore_patterns = config.scraping.ignore_patterns;
        ignore_patterns.extend(args.ignore.iter().cloned());

        Self {
            context,
            ignore_patterns,
            fetch,
            directory: config.output.directory,
            download_dir: args.download_images.clone(),
        }
    }

    fn dialect(&self) -> Dialect {
        self.context.dialect
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            Config::load_from(path).with_context(|| format!("Failed to load config file: {}", path.display()))
        }
        None => Config::load().context("Failed to load config file"),
    }
}

async fn read_input(source: &InputSource, fetch: &FetchConfig) -> anyhow::Result<String> {
    match source {
        InputSource::Url(url) => fetch_url(url.as_str(), fetch)
            .await
            .with_context(|| format!("Failed to fetch URL: {}", url)),
        InputSource::File(path) => {
            fetch_file(&path.to_string_lossy()).with_context(|| format!("Failed to read file: {}", path.display()))
        }
        InputSource::Stdin => fetch_stdin().context("Failed to read from stdin"),
    }
}

/// Fetch and render one input, downloading its images when requested
async fn convert_input(html: &str, source: &InputSource, settings: &Settings) -> anyhow::Result<RenderedPage> {
    let source_url = source.url().map(|url| url.as_str());
    let mut cx = settings.context.clone();
    let page = render(html, source_url, &cx).context("Failed to convert HTML")?;

    let Some(dir) = &settings.download_dir else {
        return Ok(page);
    };
    if page.images.is_empty() {
        return Ok(page);
    }

    let image_map = download_images(&page.images, dir, &settings.fetch)
        .await
        .with_context(|| format!("Failed to download images into {}", dir.display()))?;
    tracing::debug!(saved = image_map.len(), total = page.images.len(), "downloaded images");
    if image_map.is_empty() {
        return Ok(page);
    }

    cx.image_map = image_map;
    render(html, source_url, &cx).context("Failed to convert HTML")
}

/// File name stem built from the page title: lowercase words joined by `-`
fn file_stem(metadata: &Metadata) -> String {
    let lowered: String = metadata
        .display_title()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let slug: String = lowered
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() { "page".to_string() } else { slug.to_string() }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        echo::print_banner();
    }

    let config = load_config(args.config.as_deref())?;
    let settings = Settings::new(&args, config);
    tracing::debug!(?settings, "resolved settings");

    let total = args.inputs.len();
    let mut outputs = Vec::with_capacity(total);
    let mut pages: Vec<Metadata> = Vec::with_capacity(total);

    for (index, input) in args.inputs.iter().enumerate() {
        if is_ignored(input, &settings.ignore_patterns) {
            echo::print_warning(&format!("Skipping ignored input {}", input));
            continue;
        }

        let started = Instant::now();
        let source = InputSource::parse(input);
        if args.verbose {
            echo::print_step(index + 1, total, &format!("Reading {}", input.bright_white()));
        }

        let html = match read_input(&source, &settings.fetch).await {
            Ok(html) => html,
            Err(e) if source.url().is_some() => {
                echo::print_error(&format!("{:#}", e));
                outputs.push(error_document(settings.dialect(), input, &e.root_cause().to_string()));
                continue;
            }
            Err(e) => return Err(e),
        };

        let page = match convert_input(&html, &source, &settings).await {
            Ok(page) => page,
            Err(e) if matches!(e.downcast_ref::<ContxtError>(), Some(ContxtError::NoContent)) => {
                echo::print_warning(&format!("No content in {}", input));
                outputs.push(error_document(settings.dialect(), input, NO_CONTENT));
                continue;
            }
            Err(e) => return Err(e.context(format!("Failed to process {}", input))),
        };

        if args.verbose {
            echo::print_page_details(&page, html.len());
            echo::print_timing("Converted", started.elapsed());
        }

        outputs.push(page.output);
        pages.push(page.metadata);
    }

    if args.metadata {
        let json = serde_json::to_string_pretty(&pages).context("Failed to serialize metadata")?;
        eprintln!("{}", json);
    }

    if outputs.is_empty() {
        echo::print_warning("No inputs converted");
        return Ok(());
    }

    let joined: Vec<&str> = outputs.iter().map(|output| output.trim_end()).collect();
    let output = format!("{}\n", joined.join("\n\n"));

    let target = match (&args.output, &settings.directory) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(dir)) => {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            let stem = pages.first().map(file_stem).unwrap_or_else(|| "page".to_string());
            Some(dir.join(format!("{}.{}", stem, settings.dialect().extension())))
        }
        (None, None) => None,
    };

    match target {
        Some(path) => {
            fs::write(&path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => print!("{}", output),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: Option<&str>) -> Metadata {
        Metadata { title: title.map(str::to_string), ..Default::default() }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(&metadata(Some("Understanding Ownership in Rust"))), "understanding-ownership-in-rust");
        assert_eq!(file_stem(&metadata(Some("  C++ / Rust: a *comparison*  "))), "c-rust-a-comparison");
        assert_eq!(file_stem(&metadata(Some("こんにちは 世界"))), "こんにちは-世界");
        assert_eq!(file_stem(&metadata(Some("!!!"))), "page");
        assert_eq!(file_stem(&metadata(None)), "no-title");
    }

    #[test]
    fn test_file_stem_is_bounded() {
        let long = "word ".repeat(40);
        let stem = file_stem(&metadata(Some(&long)));
        assert!(stem.chars().count() <= MAX_STEM_LEN);
        assert!(!stem.ends_with('-'));
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "contxt",
            "-f",
            "xml",
            "--no-frontmatter",
            "--timeout",
            "5",
            "--ignore",
            "tags",
            "--strip-attributes",
            "page.html",
        ]);
        let mut config = Config::default();
        config.scraping.ignore_patterns = vec!["category".to_string()];
        config.scraping.include_images = true;

        let settings = Settings::new(&args, config);
        let cx = &settings.context;
        assert_eq!(cx.dialect, Dialect::Xml);
        assert!(!cx.frontmatter);
        assert!(cx.source_link);
        assert!(cx.include_images);
        assert!(cx.strip_attributes);
        assert_eq!(settings.fetch.timeout, 5);
        assert_eq!(settings.ignore_patterns, ["category", "tags"]);
    }

    #[test]
    fn test_config_supplies_defaults() {
        let args = Args::parse_from(["contxt", "page.html"]);
        let mut config = Config::default();
        config.output.format = Dialect::Tagged;
        config.markdown.source_link = false;
        config.scraping.strip_attributes = true;

        let settings = Settings::new(&args, config);
        assert_eq!(settings.dialect(), Dialect::Tagged);
        assert!(!settings.context.source_link);
        assert!(settings.context.strip_attributes);
        assert_eq!(settings.fetch.timeout, 30);
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Args::try_parse_from(["contxt", "-f", "pdf", "page.html"]).is_err());
        assert!(Args::try_parse_from(["contxt"]).is_err());
    }
}
