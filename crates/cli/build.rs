use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("contxt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Convert web pages into LLM-friendly context")
        .arg(clap::arg!(<INPUT> ... "URLs to fetch, local HTML files, or '-' for stdin"))
        .arg(
            clap::arg!(-o --output <FILE> "Output file (default: the configured directory, else stdout)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format")
                .value_parser(["markdown", "xml", "tagged", "html", "raw"]),
        )
        .arg(clap::arg!(--"include-images" "Append a section listing every image on the page"))
        .arg(
            clap::arg!(--"download-images" <DIR> "Download images into DIR and reference the local copies")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(clap::arg!(--"no-frontmatter" "Omit the Markdown frontmatter block"))
        .arg(clap::arg!(--"no-source-link" "Omit the Markdown \"Source:\" line"))
        .arg(clap::arg!(--"strip-attributes" "Drop non-essential attributes before converting"))
        .arg(
            clap::arg!(--ignore <SUBPATH> "Skip URLs containing this path segment")
                .action(clap::ArgAction::Append),
        )
        .arg(clap::arg!(--metadata "Print page metadata as JSON to stderr"))
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds"))
        .arg(clap::arg!(--"user-agent" <UA> "Custom User-Agent for HTTP requests"))
        .arg(
            clap::arg!(--config <FILE> "Config file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "contxt", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "contxt", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "contxt", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "contxt", &completions_dir).unwrap();
}
